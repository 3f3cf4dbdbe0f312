use std::io::Read;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{ListingKind, NewListing};

/// Parse a catalog export into listing drafts. Columns: `kind,title,capacity,deadline,
/// location,skills,description`; `skills` is `;`-separated.
pub fn parse_listings<R: Read>(reader: R) -> Result<Vec<NewListing>, CatalogCsvError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut listings = Vec::new();

    for (index, record) in csv_reader.deserialize::<CatalogRow>().enumerate() {
        let row = record?;
        listings.push(row.into_listing(index + 1)?);
    }

    Ok(listings)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogCsvError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("row {row}: deadline '{value}' is not RFC 3339 or YYYY-MM-DD")]
    Deadline { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    kind: ListingKind,
    title: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    capacity: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    deadline: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    location: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    skills: Option<String>,
    #[serde(default)]
    description: String,
}

impl CatalogRow {
    fn into_listing(self, row: usize) -> Result<NewListing, CatalogCsvError> {
        let deadline = match self.deadline {
            Some(raw) => Some(
                parse_deadline(&raw).ok_or(CatalogCsvError::Deadline { row, value: raw })?,
            ),
            None => None,
        };
        // Non-numeric capacities fall through as zero and are rejected by listing validation.
        let capacity = self
            .capacity
            .map(|raw| raw.trim().parse::<u32>().unwrap_or(0));
        let skills = self
            .skills
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|skill| !skill.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(NewListing {
            kind: self.kind,
            title: self.title,
            description: self.description,
            location: self.location,
            skills,
            capacity,
            deadline,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Deadlines given as a bare date close at the end of that day (UTC).
fn parse_deadline(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
}
