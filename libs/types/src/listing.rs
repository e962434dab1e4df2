//! Raw provider listing records
//!
//! Mirrors the market-data provider's listing payload. Every struct decodes
//! with defaults for absent fields so that sparse records still parse.

use serde::{Deserialize, Serialize};

use crate::build::BuildSpec;
use crate::ids::Vin;

/// A vehicle listing as returned by the market-data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub id: String,
    pub vin: Vin,
    pub heading: String,
    pub price: i64,
    pub price_change_percent: f64,
    pub msrp: i64,
    pub ref_price: i64,
    #[serde(rename = "ref_price_dt")]
    pub ref_price_date: i64,
    pub miles: i64,
    #[serde(rename = "carfax_1_owner")]
    pub carfax_one_owner: bool,
    pub carfax_clean_title: bool,
    pub exterior_color: String,
    pub interior_color: String,
    pub base_int_color: String,
    pub base_ext_color: String,
    pub dom: i64,
    pub dom_180: i64,
    pub dom_active: i64,
    pub dos_active: i64,
    pub data_source: String,
    pub source: String,
    pub vdp_url: String,
    pub seller_type: String,
    pub inventory_type: String,
    pub stock_no: String,
    pub in_transit: bool,
    pub last_seen_at: i64,
    pub last_seen_at_date: String,
    pub scraped_at: i64,
    pub scraped_at_date: String,
    pub first_seen_at: i64,
    pub first_seen_at_date: String,

    pub car_location: CarLocation,
    pub media: Media,
    pub extra: Extra,
    pub dealer: Dealer,

    /// Build details, when the provider already includes them
    pub build: BuildSpec,
}

impl Listing {
    /// The build spec embedded by the provider, if it carries a decode.
    pub fn embedded_build(&self) -> Option<&BuildSpec> {
        if self.build.is_empty() {
            None
        } else {
            Some(&self.build)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarLocation {
    pub seller_name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    pub state: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    pub photo_links: Vec<String>,
    pub photo_links_cached: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extra {
    pub options: Vec<String>,
    pub features: Vec<String>,
    pub seller_comments: String,
    #[serde(rename = "high_value_features")]
    pub high_value: Vec<String>,
    pub options_packages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dealer {
    pub id: i64,
    pub website: String,
    pub name: String,
    pub dealer_type: String,
    #[serde(rename = "dealership_group_name")]
    pub dealership_group: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
    pub latitude: String,
    pub longitude: String,
    pub msa_code: String,
    pub phone: String,
    pub seller_email: String,
}
