//! Request and response data types

use crate::indices::VegetationIndex;

use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request data for anomaly maps
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    /// Province (aimag) name, as in the `aimag_eng` boundary property
    #[validate(length(min = 1, message = "selectedProvince must not be empty"))]
    pub selected_province: String,
    /// District (soum) name, as in the `soum_eng` boundary property
    #[validate(length(min = 1, message = "selectedSoum must not be empty"))]
    pub selected_soum: String,
    /// Vegetation index
    pub selected_vegetation_index: VegetationIndex,
    /// Year of the anomaly, as a number or a numeric string
    #[serde(deserialize_with = "deserialize_year")]
    #[validate(range(
        min = 1984,
        max = 2100,
        message = "selectedYear must be between 1984 and 2100"
    ))]
    pub selected_year: i32,
    /// Whether to restrict the map to grazing land
    pub grazing_only: bool,
}

/// Request data for index time series
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesRequest {
    #[validate(length(min = 1, message = "selectedProvince must not be empty"))]
    pub selected_province: String,
    #[validate(length(min = 1, message = "selectedSoum must not be empty"))]
    pub selected_soum: String,
    pub selected_vegetation_index: VegetationIndex,
    pub grazing_only: bool,
}

/// Regional mean of one yearly composite
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct YearlyMean {
    pub year: i32,
    /// `None` when the region has no unmasked pixels that year
    pub mean: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YearRepr {
    Number(i32),
    String(String),
}

/// Accept years such as `2020` and `"2020"`.
fn deserialize_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match YearRepr::deserialize(deserializer)? {
        YearRepr::Number(year) => Ok(year),
        YearRepr::String(year) => year
            .trim()
            .parse()
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&year), &"a year")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    use serde_json::json;
    use serde_test::{assert_de_tokens, assert_de_tokens_error, assert_ser_tokens, Token};

    // The following tests use serde_test to validate the correct function of the deserialiser.

    #[test]
    fn test_required_fields() {
        let request_data = test_utils::get_test_request_data();
        assert_de_tokens(
            &request_data,
            &[
                Token::Struct {
                    name: "RequestData",
                    len: 5,
                },
                Token::Str("selectedProvince"),
                Token::Str("Arkhangai"),
                Token::Str("selectedSoum"),
                Token::Str("Tsetserleg"),
                Token::Str("selectedVegetationIndex"),
                Token::Enum {
                    name: "VegetationIndex",
                },
                Token::Str("NDVI"),
                Token::Unit,
                Token::Str("selectedYear"),
                Token::I32(2020),
                Token::Str("grazingOnly"),
                Token::Bool(false),
                Token::StructEnd,
            ],
        );
        request_data.validate().unwrap()
    }

    #[test]
    fn test_year_as_string() {
        let request_data = test_utils::get_test_request_data();
        assert_de_tokens(
            &request_data,
            &[
                Token::Struct {
                    name: "RequestData",
                    len: 5,
                },
                Token::Str("selectedProvince"),
                Token::Str("Arkhangai"),
                Token::Str("selectedSoum"),
                Token::Str("Tsetserleg"),
                Token::Str("selectedVegetationIndex"),
                Token::UnitVariant {
                    name: "VegetationIndex",
                    variant: "NDVI",
                },
                Token::Str("selectedYear"),
                Token::Str("2020"),
                Token::Str("grazingOnly"),
                Token::Bool(false),
                Token::StructEnd,
            ],
        );
    }

    #[test]
    fn test_invalid_year_string() {
        assert_de_tokens_error::<RequestData>(
            &[
                Token::Struct {
                    name: "RequestData",
                    len: 5,
                },
                Token::Str("selectedYear"),
                Token::Str("last year"),
                Token::StructEnd,
            ],
            "invalid value: string \"last year\", expected a year",
        )
    }

    #[test]
    fn test_missing_province() {
        assert_de_tokens_error::<RequestData>(
            &[
                Token::Struct {
                    name: "RequestData",
                    len: 0,
                },
                Token::StructEnd,
            ],
            "missing field `selectedProvince`",
        )
    }

    #[test]
    fn test_missing_grazing_only() {
        assert_de_tokens_error::<RequestData>(
            &[
                Token::Struct {
                    name: "RequestData",
                    len: 4,
                },
                Token::Str("selectedProvince"),
                Token::Str("Arkhangai"),
                Token::Str("selectedSoum"),
                Token::Str("Tsetserleg"),
                Token::Str("selectedVegetationIndex"),
                Token::UnitVariant {
                    name: "VegetationIndex",
                    variant: "EVI",
                },
                Token::Str("selectedYear"),
                Token::I32(2020),
                Token::StructEnd,
            ],
            "missing field `grazingOnly`",
        )
    }

    #[test]
    #[should_panic(expected = "selectedProvince must not be empty")]
    fn test_invalid_province() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.selected_province = "".to_string();
        request_data.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "selectedSoum must not be empty")]
    fn test_invalid_soum() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.selected_soum = "".to_string();
        request_data.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "selectedYear must be between 1984 and 2100")]
    fn test_invalid_year() {
        let mut request_data = test_utils::get_test_request_data();
        request_data.selected_year = 1900;
        request_data.validate().unwrap()
    }

    #[test]
    fn test_json() {
        let request_data: RequestData = serde_json::from_value(json!({
            "selectedProvince": "Arkhangai",
            "selectedSoum": "Tsetserleg",
            "selectedVegetationIndex": "SAVI",
            "selectedYear": "2019",
            "grazingOnly": true,
            "unknownField": 1
        }))
        .unwrap();
        assert_eq!(VegetationIndex::Savi, request_data.selected_vegetation_index);
        assert_eq!(2019, request_data.selected_year);
        assert!(request_data.grazing_only);
    }

    #[test]
    fn test_time_series_request() {
        let request: TimeSeriesRequest = serde_json::from_value(json!({
            "selectedProvince": "Arkhangai",
            "selectedSoum": "Tsetserleg",
            "selectedVegetationIndex": "NDVI",
            "grazingOnly": false
        }))
        .unwrap();
        assert_eq!(test_utils::get_test_time_series_request(), request);
        request.validate().unwrap()
    }

    #[test]
    fn test_yearly_mean() {
        assert_ser_tokens(
            &YearlyMean {
                year: 2020,
                mean: None,
            },
            &[
                Token::Struct {
                    name: "YearlyMean",
                    len: 2,
                },
                Token::Str("year"),
                Token::I32(2020),
                Token::Str("mean"),
                Token::None,
                Token::StructEnd,
            ],
        );
    }
}
