//! Businesses, their employees, and the equipment they own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    EmployeeRole: "employee role" {
        Owner => "owner",
        Manager => "manager",
        Staff => "staff",
    }
}

string_enum! {
    EquipmentStatus: "equipment status" {
        Operational => "operational",
        NeedsService => "needs_service",
        OutOfService => "out_of_service",
        Retired => "retired",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub owner_id: Uuid,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: EmployeeRole,
    pub created_at: i64,
}

/// A serviced machine (fryer, walk-in cooler, dish machine, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub category: String,
    pub serial_number: Option<String>,
    pub location: Option<String>,
    pub status: EquipmentStatus,
    /// ISO date (`YYYY-MM-DD`) as entered by the user.
    pub purchase_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
}

impl Equipment {
    /// Short human label, e.g. `"Hobart LXeR-2 (dishwasher)"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.manufacturer, self.model, self.category)
    }
}

/// Equipment search hit with its keyword score in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentMatch {
    pub equipment: Equipment,
    pub score: f64,
}
