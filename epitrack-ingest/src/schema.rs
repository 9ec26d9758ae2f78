//! Column layouts of the upstream time-series files.

use epitrack_core::{DateKey, IngestError};

use crate::table::RawTable;

/// Where the labels and the date columns live in one source layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Header of the country label column.
    pub label_column: &'static str,
    /// Header of the subregion label column.
    pub region_column: &'static str,
    /// Number of leading metadata columns before the dates.
    pub metadata_columns: usize,
    /// Metadata headers that some files of this layout add right after the prefix.
    pub optional_metadata: &'static [&'static str],
}

impl ColumnSchema {
    /// `Province/State, Country/Region, Lat, Long, <dates...>`
    pub const GLOBAL: ColumnSchema = ColumnSchema {
        label_column: "Country/Region",
        region_column: "Province/State",
        metadata_columns: 4,
        optional_metadata: &[],
    };

    /// `UID, iso2, iso3, code3, FIPS, Admin2, Province_State, Country_Region,
    /// Lat, Long_, Combined_Key[, Population], <dates...>`
    pub const US: ColumnSchema = ColumnSchema {
        label_column: "Country_Region",
        region_column: "Province_State",
        metadata_columns: 11,
        optional_metadata: &["Population"],
    };

    /// Index of the first date column in `table`.
    pub fn first_date_column(&self, table: &RawTable) -> usize {
        let mut index = self.metadata_columns;
        while table
            .headers
            .get(index)
            .is_some_and(|h| self.optional_metadata.contains(&h.as_str()))
        {
            index += 1;
        }
        index
    }

    /// Every date column as `(index, key)`, in source order.
    ///
    /// A trailing header that is not a `MM/DD/YY` date fails the whole table.
    pub fn date_columns(&self, table: &RawTable) -> Result<Vec<(usize, DateKey)>, IngestError> {
        let start = self.first_date_column(table);
        if start > table.headers.len() {
            return Err(IngestError::Csv {
                dataset: table.dataset.clone(),
                reason: format!(
                    "expected at least {} metadata columns, found {}",
                    self.metadata_columns,
                    table.headers.len()
                ),
            });
        }

        table.headers[start..]
            .iter()
            .enumerate()
            .map(|(offset, header)| {
                header
                    .parse::<DateKey>()
                    .map(|key| (start + offset, key))
                    .map_err(|_| IngestError::MalformedDate {
                        dataset: table.dataset.clone(),
                        header: header.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const US_DEATHS: &[u8] = b"UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,Population,1/22/20,1/23/20\n";
    const US_CONFIRMED: &[u8] = b"UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,1/22/20,1/23/20\n";

    #[test]
    fn test_global_dates_start_after_prefix() {
        let table =
            RawTable::from_csv("g", b"Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n")
                .unwrap();
        let dates = ColumnSchema::GLOBAL.date_columns(&table).unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0].0, 4);
        assert_eq!(dates[0].1.to_string(), "01/22/20");
    }

    #[test]
    fn test_us_layout_skips_population_column() {
        let deaths = RawTable::from_csv("us_deaths", US_DEATHS).unwrap();
        let confirmed = RawTable::from_csv("us_confirmed", US_CONFIRMED).unwrap();
        assert_eq!(ColumnSchema::US.first_date_column(&deaths), 12);
        assert_eq!(ColumnSchema::US.first_date_column(&confirmed), 11);
        assert_eq!(ColumnSchema::US.date_columns(&deaths).unwrap().len(), 2);
    }

    #[test]
    fn test_non_date_header_fails() {
        let table =
            RawTable::from_csv("g", b"Province/State,Country/Region,Lat,Long,1/22/20,notes\n")
                .unwrap();
        let err = ColumnSchema::GLOBAL.date_columns(&table).unwrap_err();
        assert!(matches!(err, IngestError::MalformedDate { header, .. } if header == "notes"));
    }
}
