//! Closed enumerations with an explicit storage representation.
//!
//! Each kind round-trips through the lowercase string stored in its `TEXT`
//! column. Unknown strings are rejected at the boundary, both when a request
//! body is deserialized and when a row is decoded.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! storage_kind {
    (
        $(#[$meta:meta])*
        $name:ident as $label:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Returns the storage representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err(ParseKindError {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

storage_kind!(
    /// Settlement state of an order.
    OrderStatus as "order status" {
        Pending => "pending",
        Paid => "paid",
        Cancelled => "cancelled",
        Returned => "returned",
    }
);

storage_kind!(
    /// Channel through which an order was placed.
    OrderMedium as "order medium" {
        Online => "online",
        Offline => "offline",
    }
);

storage_kind!(
    /// How the customer pays.
    PaymentMethod as "payment method" {
        Cash => "cash",
        Card => "card",
        /// M-Pesa and similar wallets.
        MobileMoney => "mobile_money" | "mpesa",
    }
);

storage_kind!(
    CustomerType as "customer type" {
        Individual => "individual",
        Business => "business",
    }
);

storage_kind!(
    ProductType as "product type" {
        Goods => "goods",
        Service => "service",
    }
);

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl Default for CustomerType {
    fn default() -> Self {
        CustomerType::Individual
    }
}

impl Default for ProductType {
    fn default() -> Self {
        ProductType::Goods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("offline".parse::<OrderMedium>().unwrap(), OrderMedium::Offline);
    }

    #[test]
    fn legacy_wallet_alias_is_accepted() {
        assert_eq!("mpesa".parse::<PaymentMethod>().unwrap(), PaymentMethod::MobileMoney);
        let method: PaymentMethod = serde_json::from_str("\"mpesa\"").unwrap();
        assert_eq!(method, PaymentMethod::MobileMoney);
        assert_eq!(serde_json::to_string(&method).unwrap(), "\"mobile_money\"");
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.kind, "order status");
        assert_eq!(err.value, "shipped");
        assert!(serde_json::from_str::<OrderStatus>("\"shipped\"").is_err());
    }

    #[test]
    fn defaults_match_new_records() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(CustomerType::default(), CustomerType::Individual);
        assert_eq!(ProductType::default(), ProductType::Goods);
    }
}
