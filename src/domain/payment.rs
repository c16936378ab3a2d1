use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Upi,
    Netbanking,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Netbanking => "netbanking",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" | "credit_card" | "debit_card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "netbanking" | "net_banking" | "bank" => Ok(PaymentMethod::Netbanking),
            other => Err(format!("unsupported payment method `{other}`")),
        }
    }
}

/// Method-specific payment details. Only one kind is ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PaymentDetails {
    Card { last4: String },
    Upi { upi_id: String },
    Netbanking { bank_name: String },
}

impl PaymentDetails {
    /// Builds the details matching `method` from the raw fields a client sent.
    /// Returns `Ok(None)` when no field was supplied at all.
    pub fn from_fields(
        method: PaymentMethod,
        card_number: Option<&str>,
        upi_id: Option<&str>,
        bank_name: Option<&str>,
    ) -> Result<Option<PaymentDetails>, ApiError> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        let (card, upi, bank) = (present(card_number), present(upi_id), present(bank_name));

        let supplied = [card.is_some(), upi.is_some(), bank.is_some()]
            .iter()
            .filter(|p| **p)
            .count();
        if supplied == 0 {
            return Ok(None);
        }
        if supplied > 1 {
            return Err(ApiError::Validation(
                "only one of card, UPI or bank details may be given".into(),
            ));
        }

        let details = match (method, card, upi, bank) {
            (PaymentMethod::Card, Some(number), _, _) => PaymentDetails::Card {
                last4: card_last4(number)?,
            },
            (PaymentMethod::Upi, _, Some(id), _) => PaymentDetails::Upi {
                upi_id: id.to_string(),
            },
            (PaymentMethod::Netbanking, _, _, Some(name)) => PaymentDetails::Netbanking {
                bank_name: name.to_string(),
            },
            _ => {
                return Err(ApiError::Validation(format!(
                    "payment details do not match method `{}`",
                    method.as_str()
                )))
            }
        };
        Ok(Some(details))
    }
}

fn card_last4(number: &str) -> Result<String, ApiError> {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return Err(ApiError::Validation("card number is too short".into()));
    }
    Ok(digits[digits.len() - 4..].iter().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub booking_id: String,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub details: Option<PaymentDetails>,
    pub payment_status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PaymentRecord {
    /// Records a declared payment. Nothing is charged or verified.
    pub fn completed(
        booking_id: &str,
        method: PaymentMethod,
        amount: i64,
        details: Option<PaymentDetails>,
        now: OffsetDateTime,
    ) -> PaymentRecord {
        PaymentRecord {
            booking_id: booking_id.to_string(),
            payment_method: method,
            amount,
            details,
            payment_status: PaymentStatus::Completed,
            created_at: now,
        }
    }
}
