use campus_core::error::AppError;
use campus_core::workflows::enrollment::{parse_listings, NewListing};
use clap::Args;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct CatalogCheckArgs {
    /// Catalog CSV export (kind,title,capacity,deadline,location,skills,description)
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

pub(crate) fn run_catalog_check(args: CatalogCheckArgs) -> Result<(), AppError> {
    let file = File::open(&args.csv)?;
    let listings = check_catalog(file)?;

    println!("{}: {} listing(s)", args.csv.display(), listings.len());
    for line in render_listings(&listings) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn check_catalog<R: Read>(reader: R) -> Result<Vec<NewListing>, AppError> {
    parse_listings(reader).map_err(AppError::from)
}

pub(crate) fn render_listings(listings: &[NewListing]) -> Vec<String> {
    listings
        .iter()
        .enumerate()
        .map(|(index, listing)| {
            let capacity = listing
                .capacity
                .map_or_else(|| "open".to_string(), |capacity| capacity.to_string());
            let deadline = listing
                .deadline
                .map_or_else(|| "none".to_string(), |deadline| deadline.to_rfc3339());
            format!(
                "- row {}: {} '{}' capacity={} deadline={}",
                index + 1,
                listing.kind.label(),
                listing.title,
                capacity,
                deadline
            )
        })
        .collect()
}
