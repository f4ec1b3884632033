use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ItemId);

/// One row of the paginated catalog, as rendered by list consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub display_name: String,
    pub image_url: String,
}

impl CatalogItem {
    pub fn new(id: ItemId, display_name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            image_url: image_url.into(),
        }
    }
}
