//! Yearly seasonal composites.

use crate::earthengine::{Date, Expr, Geometry, Image, ImageCollection};
use crate::error::AnomalyError;

use std::ops::RangeInclusive;
use time::Month;

/// A range of whole months within a calendar year.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Season {
    start: Month,
    end: Month,
}

impl Season {
    /// Season from `start` to `end`, both 1-based and inclusive.
    pub fn new(start: u8, end: u8) -> Result<Self, AnomalyError> {
        if start > end {
            return Err(AnomalyError::InvalidSeason { start, end });
        }
        Ok(Self {
            start: Month::try_from(start)?,
            end: Month::try_from(end)?,
        })
    }

    pub fn start_month(&self) -> u8 {
        self.start.into()
    }

    pub fn end_month(&self) -> u8 {
        self.end.into()
    }

    /// First day of the season and first day after it in `year`.
    pub fn dates(&self, year: i32) -> Result<(time::Date, time::Date), AnomalyError> {
        let start = time::Date::from_calendar_date(year, self.start, 1)?;
        let end = match self.end {
            Month::December => time::Date::from_calendar_date(year + 1, Month::January, 1)?,
            month => time::Date::from_calendar_date(year, month.next(), 1)?,
        };
        Ok((start, end))
    }
}

impl Default for Season {
    /// Northern hemisphere summer, June to August.
    fn default() -> Self {
        Self {
            start: Month::June,
            end: Month::August,
        }
    }
}

/// Median composite of one season.
#[derive(Clone, Debug, PartialEq)]
pub struct YearlyComposite {
    pub year: i32,
    pub image: Image,
}

/// One median composite per year, clipped to `region`.
pub fn yearly_composites(
    collection: &ImageCollection,
    years: RangeInclusive<i32>,
    season: &Season,
    region: &Geometry,
) -> Result<Vec<YearlyComposite>, AnomalyError> {
    years
        .map(|year| {
            let (start, end) = season.dates(year)?;
            let start = Date::new(start);
            let image = collection
                .filter_date(&start, &Date::new(end))
                .median()
                .clip(region)
                .set("system:time_start", start.millis())
                .set("start_month", Expr::constant(season.start_month()))
                .set("end_month", Expr::constant(season.end_month()));
            Ok(YearlyComposite { year, image })
        })
        .collect()
}

/// Masks pixels of a land-use raster belonging to excluded classes.
#[derive(Clone, Debug, PartialEq)]
pub struct GrazingMask {
    land_use: Image,
    excluded_classes: Vec<i64>,
}

impl GrazingMask {
    /// Mask based on the raster asset `asset`.
    pub fn new(asset: &str, excluded_classes: &[i64]) -> Self {
        Self {
            land_use: Image::load(asset),
            excluded_classes: excluded_classes.to_vec(),
        }
    }

    /// Mask pixels of `image` whose land-use class is excluded.
    pub fn apply(&self, image: &Image) -> Image {
        let keep = self
            .excluded_classes
            .iter()
            .map(|class| self.land_use.not_equals(*class as f64))
            .reduce(|keep, other| keep.and(&other));
        match keep {
            Some(keep) => image.update_mask(&keep),
            None => image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earthengine::FeatureCollection;

    use serde_json::json;
    use time::macros::date;

    fn region() -> Geometry {
        FeatureCollection::load("table").geometry()
    }

    #[test]
    fn summer_dates() {
        let season = Season::default();
        assert_eq!(
            (date!(2020 - 06 - 01), date!(2020 - 09 - 01)),
            season.dates(2020).unwrap()
        );
    }

    #[test]
    fn december_season_ends_next_year() {
        let season = Season::new(11, 12).unwrap();
        assert_eq!(
            (date!(2020 - 11 - 01), date!(2021 - 01 - 01)),
            season.dates(2020).unwrap()
        );
    }

    #[test]
    fn single_month_season() {
        let season = Season::new(2, 2).unwrap();
        assert_eq!(
            (date!(2024 - 02 - 01), date!(2024 - 03 - 01)),
            season.dates(2024).unwrap()
        );
    }

    #[test]
    fn reversed_season() {
        match Season::new(9, 6) {
            Err(AnomalyError::InvalidSeason { start: 9, end: 6 }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn invalid_month() {
        match Season::new(6, 13) {
            Err(AnomalyError::InvalidDate(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn one_composite_per_year() {
        let composites = yearly_composites(
            &ImageCollection::load("scenes"),
            2017..=2023,
            &Season::default(),
            &region(),
        )
        .unwrap();
        let years: Vec<i32> = composites.iter().map(|c| c.year).collect();
        assert_eq!((2017..=2023).collect::<Vec<_>>(), years);
    }

    #[test]
    fn composite_properties() {
        let composites = yearly_composites(
            &ImageCollection::load("scenes"),
            2020..=2020,
            &Season::default(),
            &region(),
        )
        .unwrap();
        let image = composites[0].image.expr();
        assert_eq!(Some("Element.set"), image.function_name());
        assert_eq!(
            Some(&json!("end_month")),
            image.argument_value("key").and_then(Expr::as_constant)
        );
        assert_eq!(
            Some(&json!(8)),
            image.argument_value("value").and_then(Expr::as_constant)
        );
        let start_month = image.argument_value("object").unwrap();
        assert_eq!(
            Some(&json!(6)),
            start_month.argument_value("value").and_then(Expr::as_constant)
        );
        let time_start = start_month.argument_value("object").unwrap();
        assert_eq!(
            Some("Date.millis"),
            time_start.argument_value("value").unwrap().function_name()
        );
        let clipped = time_start.argument_value("object").unwrap();
        assert_eq!(Some("Image.clip"), clipped.function_name());
        let median = clipped.argument_value("input").unwrap();
        assert_eq!(Some("ImageCollection.median"), median.function_name());
    }

    #[test]
    fn grazing_mask_excludes_classes() {
        let mask = GrazingMask::new("pasture", &[3, 5]);
        let masked = mask.apply(&Image::load("composite"));
        assert_eq!(Some("Image.updateMask"), masked.expr().function_name());
        let keep = masked.expr().argument_value("mask").unwrap();
        assert_eq!(Some("Image.and"), keep.function_name());
        assert_eq!(
            Some(Image::load("pasture").not_equals(3.0).expr()),
            keep.argument_value("image1")
        );
        assert_eq!(
            Some(Image::load("pasture").not_equals(5.0).expr()),
            keep.argument_value("image2")
        );
    }

    #[test]
    fn grazing_mask_without_classes() {
        let mask = GrazingMask::new("pasture", &[]);
        let image = Image::load("composite");
        assert_eq!(image, mask.apply(&image));
    }
}
