//! Dataset format dispatch.
//!
//! A dataset's `dataproduct_type` metadata field decides which operations
//! make sense on it: images and spectra support `cutout`, cubes support
//! `subcube`, visibilities support `subvis`. The dispatcher resolves the
//! type once, then hands back a typed handler whose method set is fixed at
//! compile time — calling a foreign method is unrepresentable rather than
//! a runtime surprise.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::client::{AstroLakeClient, CutoutCircle};
use crate::error::{AstroLakeError, Result};

/// Classification of a dataset's data product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataProductType {
    /// Two-dimensional sky image
    Image,
    /// Spectral cube
    Cube,
    /// One-dimensional spectra
    Spectra,
    /// Interferometric visibility data
    Visibility,
}

impl DataProductType {
    /// The methods exposed by this type's handler
    #[must_use]
    pub fn methods(self) -> &'static [&'static str] {
        match self {
            Self::Image | Self::Spectra => &["cutout", "show_metadata", "list_methods"],
            Self::Cube => &["subcube", "show_metadata", "list_methods"],
            Self::Visibility => &["subvis", "show_metadata", "list_methods"],
        }
    }

    /// The metadata-field spelling of this type
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Cube => "cube",
            Self::Spectra => "spectra",
            Self::Visibility => "visibility",
        }
    }
}

impl FromStr for DataProductType {
    type Err = AstroLakeError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "cube" => Ok(Self::Cube),
            "spectra" => Ok(Self::Spectra),
            "visibility" => Ok(Self::Visibility),
            other => Err(AstroLakeError::UnsupportedDataProductType(
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for DataProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and resolved type of a dataset.
///
/// Resolved once from remote metadata; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    /// The data identifier's namespace
    pub namespace: String,
    /// The data identifier's name
    pub name: String,
    /// Declared data product type
    pub dataproduct_type: DataProductType,
}

/// Read the `dataproduct_type` field out of a dataset metadata document
pub(crate) fn dataproduct_type_of(metadata: &serde_json::Value) -> Result<DataProductType> {
    let value = metadata
        .get("dataproduct_type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            AstroLakeError::UnsupportedDataProductType("missing dataproduct_type".to_string())
        })?;
    value.parse()
}

/// A dataset handler dispatched on data product type.
///
/// Handlers borrow the owning client for token access; they never own
/// tokens themselves. Use [`list_methods`](Self::list_methods) to inspect
/// the capability set, or the `as_*` accessors to reach the type-specific
/// operations.
#[derive(Debug)]
pub enum FormatHandler<'c> {
    /// Image dataset: supports `cutout`
    Image(ImageProduct<'c>),
    /// Cube dataset: supports `subcube`
    Cube(CubeProduct<'c>),
    /// Spectra dataset: supports `cutout`
    Spectra(SpectraProduct<'c>),
    /// Visibility dataset: supports `subvis`
    Visibility(VisibilityProduct<'c>),
}

impl<'c> FormatHandler<'c> {
    pub(crate) fn attach(client: &'c AstroLakeClient, dataset: DatasetDescriptor) -> Self {
        match dataset.dataproduct_type {
            DataProductType::Image => Self::Image(ImageProduct { client, dataset }),
            DataProductType::Cube => Self::Cube(CubeProduct { client, dataset }),
            DataProductType::Spectra => Self::Spectra(SpectraProduct { client, dataset }),
            DataProductType::Visibility => Self::Visibility(VisibilityProduct { client, dataset }),
        }
    }

    /// The dataset this handler operates on
    #[must_use]
    pub fn dataset(&self) -> &DatasetDescriptor {
        match self {
            Self::Image(p) => &p.dataset,
            Self::Cube(p) => &p.dataset,
            Self::Spectra(p) => &p.dataset,
            Self::Visibility(p) => &p.dataset,
        }
    }

    /// The resolved data product type
    #[must_use]
    pub fn dataproduct_type(&self) -> DataProductType {
        self.dataset().dataproduct_type
    }

    /// The methods this handler exposes
    #[must_use]
    pub fn list_methods(&self) -> &'static [&'static str] {
        self.dataproduct_type().methods()
    }

    /// Fetch the full metadata document for the dataset
    ///
    /// # Errors
    ///
    /// Fails if the metadata service rejects the request or the caller is
    /// not authenticated.
    pub async fn show_metadata(&self) -> Result<serde_json::Value> {
        let dataset = self.dataset();
        match self {
            Self::Image(p) => p.client,
            Self::Cube(p) => p.client,
            Self::Spectra(p) => p.client,
            Self::Visibility(p) => p.client,
        }
        .get_metadata(&dataset.namespace, &dataset.name)
        .await
    }

    /// This handler as an image product, if it is one
    #[must_use]
    pub fn as_image(&self) -> Option<&ImageProduct<'c>> {
        match self {
            Self::Image(p) => Some(p),
            _ => None,
        }
    }

    /// This handler as a cube product, if it is one
    #[must_use]
    pub fn as_cube(&self) -> Option<&CubeProduct<'c>> {
        match self {
            Self::Cube(p) => Some(p),
            _ => None,
        }
    }

    /// This handler as a spectra product, if it is one
    #[must_use]
    pub fn as_spectra(&self) -> Option<&SpectraProduct<'c>> {
        match self {
            Self::Spectra(p) => Some(p),
            _ => None,
        }
    }

    /// This handler as a visibility product, if it is one
    #[must_use]
    pub fn as_visibility(&self) -> Option<&VisibilityProduct<'c>> {
        match self {
            Self::Visibility(p) => Some(p),
            _ => None,
        }
    }
}

/// Handler for image datasets
#[derive(Debug)]
pub struct ImageProduct<'c> {
    client: &'c AstroLakeClient,
    dataset: DatasetDescriptor,
}

impl ImageProduct<'_> {
    /// Cut a circular region out of the image and write it to `output`
    ///
    /// # Errors
    ///
    /// Fails if the cutout service rejects the request or the output file
    /// cannot be written.
    pub async fn cutout(&self, circle: CutoutCircle, output: &Path) -> Result<PathBuf> {
        self.client
            .soda_cutout(&self.dataset.namespace, &self.dataset.name, circle, output)
            .await
    }

    /// The methods this handler exposes
    #[must_use]
    pub fn list_methods(&self) -> &'static [&'static str] {
        DataProductType::Image.methods()
    }
}

/// Handler for spectral-cube datasets
#[derive(Debug)]
pub struct CubeProduct<'c> {
    client: &'c AstroLakeClient,
    dataset: DatasetDescriptor,
}

impl CubeProduct<'_> {
    /// Extract a spatial sub-cube around a circular region and write it to
    /// `output`
    ///
    /// # Errors
    ///
    /// Fails if the cutout service rejects the request or the output file
    /// cannot be written.
    pub async fn subcube(&self, circle: CutoutCircle, output: &Path) -> Result<PathBuf> {
        self.client
            .soda_cutout(&self.dataset.namespace, &self.dataset.name, circle, output)
            .await
    }

    /// The methods this handler exposes
    #[must_use]
    pub fn list_methods(&self) -> &'static [&'static str] {
        DataProductType::Cube.methods()
    }
}

/// Handler for spectra datasets
#[derive(Debug)]
pub struct SpectraProduct<'c> {
    client: &'c AstroLakeClient,
    dataset: DatasetDescriptor,
}

impl SpectraProduct<'_> {
    /// Cut a circular region out of the spectra and write it to `output`
    ///
    /// # Errors
    ///
    /// Fails if the cutout service rejects the request or the output file
    /// cannot be written.
    pub async fn cutout(&self, circle: CutoutCircle, output: &Path) -> Result<PathBuf> {
        self.client
            .soda_cutout(&self.dataset.namespace, &self.dataset.name, circle, output)
            .await
    }

    /// The methods this handler exposes
    #[must_use]
    pub fn list_methods(&self) -> &'static [&'static str] {
        DataProductType::Spectra.methods()
    }
}

/// Handler for visibility datasets
#[derive(Debug)]
pub struct VisibilityProduct<'c> {
    client: &'c AstroLakeClient,
    dataset: DatasetDescriptor,
}

impl VisibilityProduct<'_> {
    /// Extract the visibilities covering a circular region and write them
    /// to `output`
    ///
    /// # Errors
    ///
    /// Fails if the cutout service rejects the request or the output file
    /// cannot be written.
    pub async fn subvis(&self, circle: CutoutCircle, output: &Path) -> Result<PathBuf> {
        self.client
            .soda_cutout(&self.dataset.namespace, &self.dataset.name, circle, output)
            .await
    }

    /// The methods this handler exposes
    #[must_use]
    pub fn list_methods(&self) -> &'static [&'static str] {
        DataProductType::Visibility.methods()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn offline_client() -> AstroLakeClient {
        let config = ClientConfig::builder()
            .access_token_path(None)
            .refresh_token_path(None)
            .build();
        AstroLakeClient::new(config).unwrap()
    }

    fn descriptor(dataproduct_type: DataProductType) -> DatasetDescriptor {
        DatasetDescriptor {
            namespace: "testing".to_string(),
            name: "obs1.fits".to_string(),
            dataproduct_type,
        }
    }

    #[test]
    fn test_parse_known_types() {
        assert_eq!(
            "image".parse::<DataProductType>().unwrap(),
            DataProductType::Image
        );
        assert_eq!(
            "CUBE".parse::<DataProductType>().unwrap(),
            DataProductType::Cube
        );
        assert_eq!(
            "Spectra".parse::<DataProductType>().unwrap(),
            DataProductType::Spectra
        );
        assert_eq!(
            "visibility".parse::<DataProductType>().unwrap(),
            DataProductType::Visibility
        );
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let err = "timeseries".parse::<DataProductType>().unwrap_err();
        assert!(matches!(
            err,
            AstroLakeError::UnsupportedDataProductType(t) if t == "timeseries"
        ));
    }

    #[test]
    fn test_capability_tables() {
        assert_eq!(
            DataProductType::Image.methods(),
            &["cutout", "show_metadata", "list_methods"]
        );
        assert_eq!(
            DataProductType::Cube.methods(),
            &["subcube", "show_metadata", "list_methods"]
        );
        assert_eq!(
            DataProductType::Spectra.methods(),
            &["cutout", "show_metadata", "list_methods"]
        );
        assert_eq!(
            DataProductType::Visibility.methods(),
            &["subvis", "show_metadata", "list_methods"]
        );
    }

    #[test]
    fn test_dataproduct_type_of_metadata() {
        let metadata = serde_json::json!({"dataproduct_type": "cube", "obs_id": "x"});
        assert_eq!(
            dataproduct_type_of(&metadata).unwrap(),
            DataProductType::Cube
        );
    }

    #[test]
    fn test_dataproduct_type_missing_fails() {
        let metadata = serde_json::json!({"obs_id": "x"});
        assert!(matches!(
            dataproduct_type_of(&metadata),
            Err(AstroLakeError::UnsupportedDataProductType(_))
        ));
    }

    #[test]
    fn test_attach_maps_type_to_variant() {
        let client = offline_client();

        let handler = FormatHandler::attach(&client, descriptor(DataProductType::Image));
        assert!(handler.as_image().is_some());
        assert!(handler.as_cube().is_none());

        let handler = FormatHandler::attach(&client, descriptor(DataProductType::Cube));
        assert!(handler.as_cube().is_some());
        assert_eq!(handler.dataproduct_type(), DataProductType::Cube);
        assert_eq!(
            handler.list_methods(),
            &["subcube", "show_metadata", "list_methods"]
        );

        let handler = FormatHandler::attach(&client, descriptor(DataProductType::Visibility));
        assert!(handler.as_visibility().is_some());
        assert!(handler.as_spectra().is_none());
    }
}
