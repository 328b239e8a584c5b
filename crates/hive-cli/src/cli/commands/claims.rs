use crate::cli::args::ClaimsArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub fn run(args: ClaimsArgs) -> anyhow::Result<i32> {
    let content = super::read_paper(&args.file)?;
    let claims = hive_verify::extract_claims(&content);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&claims)?);
    } else if claims.is_empty() {
        eprintln!("no claims found under Results or Conclusion headings");
    } else {
        for claim in &claims {
            println!("{claim}");
        }
    }
    Ok(EXIT_SUCCESS)
}
