use paygrade::crawler::SourceRegistry;
use paygrade::error::Result;

/// Print the URL a source would be fetched from for `company`
pub fn url(source: &str, company: &str) -> Result<()> {
    let url = SourceRegistry::new().resolve(source, company)?;
    println!("{url}");
    Ok(())
}
