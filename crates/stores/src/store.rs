use core::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use courier_auth::{Actor, Role, StoreOwnership};
use courier_core::{DomainError, DomainResult, Entity, Rate, RegionId, StoreId, UserId};

use crate::schedule::parse_optional_time_of_day;

/// Platform-level manual override, set by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminOverride {
    #[default]
    Auto,
    ForceOpen,
    ForceClosed,
}

/// Store-level manual override, set by the owner. Owners can close, never force open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerOverride {
    #[default]
    Auto,
    ForceClosed,
}

impl AdminOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminOverride::Auto => "AUTO",
            AdminOverride::ForceOpen => "FORCE_OPEN",
            AdminOverride::ForceClosed => "FORCE_CLOSED",
        }
    }
}

impl OwnerOverride {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerOverride::Auto => "AUTO",
            OwnerOverride::ForceClosed => "FORCE_CLOSED",
        }
    }
}

impl FromStr for AdminOverride {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(AdminOverride::Auto),
            "FORCE_OPEN" => Ok(AdminOverride::ForceOpen),
            "FORCE_CLOSED" => Ok(AdminOverride::ForceClosed),
            _ => Err(DomainError::validation(
                "status must be one of: AUTO, FORCE_OPEN, FORCE_CLOSED",
            )),
        }
    }
}

impl FromStr for OwnerOverride {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(OwnerOverride::Auto),
            "FORCE_CLOSED" => Ok(OwnerOverride::ForceClosed),
            _ => Err(DomainError::validation("status must be one of: AUTO, FORCE_CLOSED")),
        }
    }
}

/// The slice of a store the order lifecycle depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    /// Admin visibility gate (false until approved).
    pub is_active: bool,
    pub admin_forced_status: AdminOverride,
    pub owner_choice_status: OwnerOverride,
    pub default_opening_time: Option<NaiveTime>,
    pub default_closing_time: Option<NaiveTime>,
    /// Fraction of the items subtotal owed to the platform; unset until an admin sets it.
    pub commission_rate: Option<Rate>,
    pub regions: Vec<RegionId>,
}

impl Entity for Store {
    type Id = StoreId;
    const KIND: &'static str = "store";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Store {
    /// A freshly registered store: inactive, AUTO/AUTO, no schedule, no rate.
    pub fn new(id: StoreId, owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
            is_active: false,
            admin_forced_status: AdminOverride::Auto,
            owner_choice_status: OwnerOverride::Auto,
            default_opening_time: None,
            default_closing_time: None,
            commission_rate: None,
            regions: Vec::new(),
        }
    }

    pub fn ownership(&self) -> StoreOwnership {
        StoreOwnership {
            store_id: self.id,
            owner_id: self.owner_id,
            regions: self.regions.clone(),
        }
    }

    pub fn set_admin_override(&mut self, actor: &Actor, status: AdminOverride) -> DomainResult<()> {
        ensure_admin(actor)?;
        self.admin_forced_status = status;
        Ok(())
    }

    pub fn set_owner_override(&mut self, actor: &Actor, status: OwnerOverride) -> DomainResult<()> {
        if !actor.has_role(Role::StoreOwner) || actor.user_id != self.owner_id {
            return Err(DomainError::Unauthorized);
        }
        self.owner_choice_status = status;
        Ok(())
    }

    /// Replace the default schedule. `None` / empty clears a bound.
    pub fn set_schedule(
        &mut self,
        actor: &Actor,
        opening: Option<&str>,
        closing: Option<&str>,
    ) -> DomainResult<()> {
        ensure_admin(actor)?;
        let opening = parse_optional_time_of_day(opening)?;
        let closing = parse_optional_time_of_day(closing)?;
        self.default_opening_time = opening;
        self.default_closing_time = closing;
        Ok(())
    }

    pub fn set_commission_rate(&mut self, actor: &Actor, rate: Rate) -> DomainResult<()> {
        ensure_admin(actor)?;
        self.commission_rate = Some(rate);
        Ok(())
    }

    /// Approve or suspend a store. Admins anywhere, branch managers inside their regions.
    pub fn set_active(&mut self, actor: &Actor, active: bool) -> DomainResult<()> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::BranchManager => actor.has_scope_over(self.id),
            _ => false,
        };
        if !allowed {
            return Err(DomainError::Unauthorized);
        }
        self.is_active = active;
        Ok(())
    }
}

fn ensure_admin(actor: &Actor) -> DomainResult<()> {
    if actor.has_role(Role::Admin) {
        Ok(())
    } else {
        Err(DomainError::Unauthorized)
    }
}
