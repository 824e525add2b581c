use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
                match s.as_str() {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }
    };
}

wire_enum!(LeaseStatus {
    Active => "active",
    Pending => "pending",
    Expired => "expired",
    Terminated => "terminated",
});

wire_enum!(PaymentStatus {
    Current => "current",
    Partial => "partial",
    Overdue => "overdue",
    Paid => "paid",
});

wire_enum!(ChargeFrequency {
    Monthly => "monthly",
    Quarterly => "quarterly",
    Yearly => "yearly",
    Once => "once",
});

wire_enum!(ChargeCategory {
    Rent => "rent",
    Utilities => "utilities",
    Deposit => "deposit",
    LateFee => "late_fee",
    Maintenance => "maintenance",
    Other => "other",
});

wire_enum!(PaymentMethod {
    Cash => "cash",
    Check => "check",
    BankTransfer => "bank_transfer",
    Card => "card",
    Other => "other",
});

wire_enum!(PaymentType {
    Regular => "regular",
    Deposit => "deposit",
    Advance => "advance",
});

wire_enum!(UserType {
    Admin => "admin",
    Manager => "manager",
    ReadOnly => "read_only",
});

impl UserType {
    pub fn can_edit(&self) -> bool {
        !matches!(self, UserType::ReadOnly)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, UserType::Admin)
    }
}

/// One billing period of a lease as reported by the overview procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeInterval {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub is_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseOverview {
    pub lease_id: i64,
    pub asset_id: i64,
    pub asset_name: String,
    pub renter_id: i64,
    pub renter_name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub lease_status: LeaseStatus,
    pub payment_status: PaymentStatus,
    pub base_charge_amount: f64,
    pub charge_frequency: ChargeFrequency,
    #[serde(default)]
    pub total_balance: f64,
    #[serde(default)]
    pub overdue_balance: f64,
    #[serde(default)]
    pub charge_intervals: Vec<ChargeInterval>,
}

impl LeaseOverview {
    pub fn is_open(&self) -> bool {
        matches!(self.lease_status, LeaseStatus::Active | LeaseStatus::Pending)
    }
}

/// An outstanding charge against a lease. Read-only snapshot owned by the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub charge_id: i64,
    pub category: ChargeCategory,
    pub total_due: f64,
    #[serde(default)]
    pub amount_paid: f64,
    pub balance_remaining: f64,
    pub due_date: NaiveDate,
}

impl Charge {
    pub fn is_paid(&self) -> bool {
        self.balance_remaining < 0.01
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcedureOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChargeOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub charge_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeaseOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub lease_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_type: Option<UserType>,
}
