//! Access gate and custody transfer rules for crop records.
//!
//! A record's position in the chain is never stored; it is inferred from
//! which custody blocks are populated. Writes are role-gated: a caller may
//! only touch the fields of its own stage block, and populated blocks are
//! never cleared by a later stage.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Crop, User};
use crate::error::{FarmChainError, FarmChainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Farmer,
    Distributor,
    Retailer,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "FARMER",
            Role::Distributor => "DISTRIBUTOR",
            Role::Retailer => "RETAILER",
            Role::Consumer => "CONSUMER",
        }
    }

    /// FARMER and DISTRIBUTOR accounts carry a 3-digit traceability code.
    pub fn carries_code(&self) -> bool {
        matches!(self, Role::Farmer | Role::Distributor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FARMER" => Ok(Role::Farmer),
            "DISTRIBUTOR" => Ok(Role::Distributor),
            "RETAILER" => Ok(Role::Retailer),
            "CONSUMER" => Ok(Role::Consumer),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Origin,
    AtDistributor,
    AtRetailer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Origin => "ORIGIN",
            Stage::AtDistributor => "AT_DISTRIBUTOR",
            Stage::AtRetailer => "AT_RETAILER",
        }
    }
}

/// Infers the stage from the populated custody blocks.
pub fn stage_of(crop: &Crop) -> Stage {
    if crop.retailer_name.is_some() || crop.retailer_received_date.is_some() {
        Stage::AtRetailer
    } else if crop.distributor_id.is_some() {
        Stage::AtDistributor
    } else {
        Stage::Origin
    }
}

/// Typed crop payload for create and update. Unknown keys are rejected
/// outright; identity fields are accepted on the wire but always
/// overwritten from the caller's profile. Dates arrive as strings and are
/// validated before any field is applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CropInput {
    pub name: Option<String>,
    pub crop_type: Option<String>,
    pub harvest_date: Option<String>,
    pub expiry_date: Option<String>,
    pub soil_type: Option<String>,
    pub pesticides_used: Option<String>,
    pub image_url: Option<String>,

    pub farmer_id: Option<String>,
    pub farmer_name: Option<String>,
    pub farmer_location: Option<String>,

    pub distributor_id: Option<String>,
    pub distributor_name: Option<String>,
    pub distributor_location: Option<String>,
    pub distributor_received_date: Option<String>,
    pub sent_to_retailer: Option<String>,
    pub retailer_location: Option<String>,

    pub retailer_name: Option<String>,
    pub retailer_received_date: Option<String>,
    pub received_from_distributor: Option<String>,
    pub distributor_location_retailer: Option<String>,
}

pub fn parse_date_safe(date_str: &str) -> Option<NaiveDate> {
    if date_str.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%Y%m%d"))
        .ok()
}

fn parse_date_field(raw: Option<&str>, field: &str) -> FarmChainResult<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date_safe(s).map(Some).ok_or_else(|| {
            FarmChainError::Validation(format!("Invalid date for {}: {}", field, s))
        }),
    }
}

/// UPDATE is open to the record's owner and to downstream handlers;
/// everyone else is denied before any field is touched.
pub fn authorize_update(role: Role, is_owner: bool) -> FarmChainResult<()> {
    if is_owner || matches!(role, Role::Distributor | Role::Retailer) {
        Ok(())
    } else {
        Err(FarmChainError::Forbidden(
            "You are not allowed to update this crop".to_string(),
        ))
    }
}

/// DELETE is owner-only, at any stage.
pub fn authorize_delete(is_owner: bool) -> FarmChainResult<()> {
    if is_owner {
        Ok(())
    } else {
        Err(FarmChainError::Forbidden(
            "Only the crop owner can delete it".to_string(),
        ))
    }
}

/// Builds a new record owned by the caller. The caller's own stage identity
/// fields come from its profile; client-supplied values for them are
/// discarded.
pub fn apply_create(owner: &User, input: &CropInput) -> FarmChainResult<Crop> {
    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FarmChainError::Validation("Crop name is required".to_string()))?;

    let mut crop = Crop {
        id: 0,
        user_id: owner.id,
        name: name.to_string(),
        crop_type: input.crop_type.clone(),
        harvest_date: parse_date_field(input.harvest_date.as_deref(), "harvestDate")?,
        expiry_date: parse_date_field(input.expiry_date.as_deref(), "expiryDate")?,
        soil_type: input.soil_type.clone(),
        pesticides_used: input.pesticides_used.clone(),
        image_url: input.image_url.clone(),
        farmer_id: None,
        farmer_name: None,
        farmer_location: None,
        distributor_id: None,
        distributor_name: None,
        distributor_location: None,
        distributor_received_date: None,
        sent_to_retailer: None,
        retailer_location: None,
        retailer_name: None,
        retailer_received_date: None,
        received_from_distributor: None,
        distributor_location_retailer: None,
        created_at: None,
        updated_at: None,
    };

    match owner.role()? {
        Role::Farmer => {
            crop.farmer_id = owner.farmer_id.clone();
            crop.farmer_name = Some(owner.name.clone());
            crop.farmer_location = owner.location.clone();
        }
        Role::Distributor => {
            crop.distributor_id = owner.distributor_id.clone();
            crop.distributor_name = Some(owner.name.clone());
            crop.distributor_location = owner.location.clone();
        }
        Role::Retailer => {
            crop.retailer_name = Some(owner.name.clone());
        }
        Role::Consumer => {}
    }

    Ok(crop)
}

/// Applies a role-gated update in place. Only the caller's own stage block
/// (plus origin fields when the caller owns the record) is written; payload
/// fields belonging to other stages are ignored.
pub fn apply_update(caller: &User, crop: &mut Crop, input: &CropInput) -> FarmChainResult<()> {
    let role = caller.role()?;
    let is_owner = caller.id == crop.user_id;
    authorize_update(role, is_owner)?;

    if is_owner {
        if let Some(name) = input.name.as_deref() {
            if name.trim().is_empty() {
                return Err(FarmChainError::Validation(
                    "Crop name is required".to_string(),
                ));
            }
            crop.name = name.trim().to_string();
        }
        apply_if_present(&mut crop.crop_type, &input.crop_type);
        if let Some(d) = parse_date_field(input.harvest_date.as_deref(), "harvestDate")? {
            crop.harvest_date = Some(d);
        }
        if let Some(d) = parse_date_field(input.expiry_date.as_deref(), "expiryDate")? {
            crop.expiry_date = Some(d);
        }
        apply_if_present(&mut crop.soil_type, &input.soil_type);
        apply_if_present(&mut crop.pesticides_used, &input.pesticides_used);
        apply_if_present(&mut crop.image_url, &input.image_url);
    }

    match role {
        Role::Distributor => {
            // A populated distributor block belongs to one distributor;
            // another code holder may not rewrite it.
            if let Some(existing) = crop.distributor_id.as_deref() {
                if caller.distributor_id.as_deref() != Some(existing) {
                    return Err(FarmChainError::Forbidden(
                        "This crop is already handled by another distributor".to_string(),
                    ));
                }
            }
            crop.distributor_id = caller.distributor_id.clone();
            crop.distributor_name = Some(caller.name.clone());
            crop.distributor_location = caller.location.clone();
            if let Some(d) =
                parse_date_field(input.distributor_received_date.as_deref(), "distributorReceivedDate")?
            {
                crop.distributor_received_date = Some(d);
            }
            // Advisory handoff metadata for the retailer; does not advance
            // the stage by itself.
            apply_if_present(&mut crop.sent_to_retailer, &input.sent_to_retailer);
            apply_if_present(&mut crop.retailer_location, &input.retailer_location);
        }
        Role::Retailer => {
            crop.retailer_name = Some(caller.name.clone());
            if let Some(d) =
                parse_date_field(input.retailer_received_date.as_deref(), "retailerReceivedDate")?
            {
                crop.retailer_received_date = Some(d);
            }
            // Free-text provenance; deliberately not checked against the
            // distributor block.
            apply_if_present(
                &mut crop.received_from_distributor,
                &input.received_from_distributor,
            );
            apply_if_present(
                &mut crop.distributor_location_retailer,
                &input.distributor_location_retailer,
            );
        }
        Role::Farmer | Role::Consumer => {}
    }

    Ok(())
}

fn apply_if_present(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        *target = value.clone();
    }
}
