//! Dates, filters, reducers, dictionaries and geometries.

use crate::earthengine::expr::Expr;

use serde_json::Value;

ee_object!(
    /// A server-side date.
    Date
);
ee_object!(
    /// A collection filter.
    Filter
);
ee_object!(
    /// An aggregation function used by `reduce` and `reduceRegion`.
    Reducer
);
ee_object!(
    /// A server-side dictionary.
    Dictionary
);
ee_object!(
    /// A server-side geometry.
    Geometry
);

impl Date {
    /// A date parsed by Earth Engine from its ISO representation.
    pub fn new(date: time::Date) -> Self {
        Date(Expr::invoke(
            "Date",
            [("value", Expr::constant(date.to_string()))],
        ))
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> Expr {
        Expr::invoke("Date.millis", [("date", self.0.clone())])
    }
}

impl Filter {
    /// Property `field` equals `value`.
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Filter(Expr::invoke(
            "Filter.equals",
            [
                ("leftField", Expr::constant(field)),
                ("rightValue", Expr::constant(value)),
            ],
        ))
    }

    /// Property `field` is strictly less than `value`.
    pub fn less_than(field: &str, value: f64) -> Self {
        Filter(Expr::invoke(
            "Filter.lessThan",
            [
                ("leftField", Expr::constant(field)),
                ("rightValue", Expr::constant(value)),
            ],
        ))
    }

    /// All of `filters` match.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter(Expr::invoke(
            "Filter.and",
            [(
                "filters",
                Expr::array(filters.into_iter().map(Expr::from)),
            )],
        ))
    }

    /// Element footprint intersects `geometry`.
    pub fn bounds(geometry: &Geometry) -> Self {
        Filter(Expr::invoke(
            "Filter.intersects",
            [
                ("leftField", Expr::constant(".all")),
                ("rightValue", geometry.0.clone()),
            ],
        ))
    }

    /// `system:time_start` lies in `[start, end)`.
    pub fn date(start: &Date, end: &Date) -> Self {
        let range = Expr::invoke(
            "DateRange",
            [("start", start.0.clone()), ("end", end.0.clone())],
        );
        Filter(Expr::invoke(
            "Filter.dateRangeContains",
            [
                ("leftValue", range),
                ("rightField", Expr::constant("system:time_start")),
            ],
        ))
    }
}

impl Reducer {
    pub fn mean() -> Self {
        Reducer(Expr::call("Reducer.mean"))
    }

    pub fn std_dev() -> Self {
        Reducer(Expr::call("Reducer.stdDev"))
    }

    /// Collects every input into a list.
    pub fn to_list() -> Self {
        Reducer(Expr::call("Reducer.toList"))
    }
}

impl Dictionary {
    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Expr {
        Expr::invoke(
            "Dictionary.get",
            [("dictionary", self.0.clone()), ("key", Expr::constant(key))],
        )
    }
}
