//! Image and feature collections.

use crate::earthengine::expr::Expr;
use crate::earthengine::image::Image;
use crate::earthengine::primitives::{Date, Filter, Geometry, Reducer};

ee_object!(
    /// A stack of images, typically one per satellite scene.
    ImageCollection
);
ee_object!(
    /// A table of vector features.
    FeatureCollection
);

impl ImageCollection {
    /// Load an image collection asset.
    pub fn load(id: &str) -> Self {
        ImageCollection(Expr::invoke(
            "ImageCollection.load",
            [("id", Expr::constant(id))],
        ))
    }

    /// A collection made of the given images, in order.
    pub fn from_images(images: impl IntoIterator<Item = Image>) -> Self {
        ImageCollection(Expr::invoke(
            "ImageCollection.fromImages",
            [("images", Expr::array(images.into_iter().map(Expr::from)))],
        ))
    }

    /// Apply `algorithm` to every image.
    pub fn map<F>(&self, algorithm: F) -> Self
    where
        F: Fn(Image) -> Image,
    {
        let base_algorithm = Expr::function(|image| algorithm(Image::from(image)).into());
        ImageCollection(Expr::invoke(
            "Collection.map",
            [
                ("collection", self.0.clone()),
                ("baseAlgorithm", base_algorithm),
            ],
        ))
    }

    /// Select and rename bands of every image.
    pub fn select_as(&self, bands: &[&str], names: &[&str]) -> Self {
        self.map(|image| image.select_as(bands, names))
    }

    pub fn filter(&self, filter: &Filter) -> Self {
        ImageCollection(Expr::invoke(
            "Collection.filter",
            [("collection", self.0.clone()), ("filter", filter.expr().clone())],
        ))
    }

    /// Keep images whose footprint intersects `geometry`.
    pub fn filter_bounds(&self, geometry: &Geometry) -> Self {
        self.filter(&Filter::bounds(geometry))
    }

    /// Keep images acquired in `[start, end)`.
    pub fn filter_date(&self, start: &Date, end: &Date) -> Self {
        self.filter(&Filter::date(start, end))
    }

    pub fn merge(&self, other: &ImageCollection) -> Self {
        ImageCollection(Expr::invoke(
            "Collection.merge",
            [
                ("collection1", self.0.clone()),
                ("collection2", other.0.clone()),
            ],
        ))
    }

    pub fn first(&self) -> Image {
        Image::from(Expr::invoke(
            "Collection.first",
            [("collection", self.0.clone())],
        ))
    }

    /// Per-pixel mean across the collection.
    pub fn mean(&self) -> Image {
        Image::from(Expr::invoke(
            "ImageCollection.mean",
            [("collection", self.0.clone())],
        ))
    }

    /// Per-pixel median across the collection.
    pub fn median(&self) -> Image {
        Image::from(Expr::invoke(
            "ImageCollection.median",
            [("collection", self.0.clone())],
        ))
    }

    /// Per-pixel reduction across the collection with an arbitrary reducer.
    pub fn reduce(&self, reducer: &Reducer) -> Image {
        Image::from(Expr::invoke(
            "ImageCollection.reduce",
            [
                ("collection", self.0.clone()),
                ("reducer", reducer.expr().clone()),
            ],
        ))
    }
}

impl FeatureCollection {
    /// Load a table asset.
    pub fn load(id: &str) -> Self {
        FeatureCollection(Expr::invoke(
            "Collection.loadTable",
            [("tableId", Expr::constant(id))],
        ))
    }

    pub fn filter(&self, filter: &Filter) -> Self {
        FeatureCollection(Expr::invoke(
            "Collection.filter",
            [("collection", self.0.clone()), ("filter", filter.expr().clone())],
        ))
    }

    /// Union of all feature geometries.
    pub fn geometry(&self) -> Geometry {
        Geometry::from(Expr::invoke(
            "Collection.geometry",
            [("collection", self.0.clone())],
        ))
    }
}
