use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::{
	postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
	Decode, Encode, Postgres, Type,
};

/// Fixed-precision amount stored in the smallest on-chain unit (wei-equivalent).
///
/// Comparisons and arithmetic on `Wei` are plain integer operations. There is
/// deliberately no `From<f64>` or `PartialEq<f64>` impl: a float must never
/// enter a monetary invariant.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Wei(pub u128);

impl Wei {
	pub const ZERO: Wei = Wei(0);

	pub fn checked_add(self, other: Wei) -> Option<Wei> {
		self.0.checked_add(other.0).map(Wei)
	}

	pub fn checked_sub(self, other: Wei) -> Option<Wei> {
		self.0.checked_sub(other.0).map(Wei)
	}

	/// Converts to a human-readable decimal string with `decimals` fractional digits.
	pub fn to_human(self, decimals: u32) -> String {
		let base = 10u128.pow(decimals);
		let whole = self.0 / base;
		let frac = self.0 % base;
		if decimals == 0 {
			whole.to_string()
		} else {
			format!("{whole}.{frac:0width$}", width = decimals as usize)
		}
	}

	/// Parses a human-readable decimal string with `decimals` fractional digits.
	///
	/// Returns `None` if the string has more fractional digits than `decimals`
	/// allows, since that would silently truncate precision.
	pub fn from_human(s: &str, decimals: u32) -> Option<Wei> {
		let base = 10u128.pow(decimals);
		let (whole, frac) = match s.split_once('.') {
			Some((w, f)) => (w, f),
			None => (s, ""),
		};
		if frac.len() > decimals as usize {
			return None;
		}
		let whole: u128 = whole.parse().ok()?;
		let frac_padded = format!("{frac:0<width$}", width = decimals as usize);
		let frac: u128 = if frac_padded.is_empty() { 0 } else { frac_padded.parse().ok()? };
		whole.checked_mul(base)?.checked_add(frac).map(Wei)
	}
}

impl fmt::Display for Wei {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Stored as `NUMERIC` rather than `BIGINT`: a u128 smallest-unit amount
/// (e.g. 18-decimal token wei) can exceed `i64::MAX`, and `NUMERIC` is what
/// the pack's own token-amount handling (workspace `bigdecimal` dependency)
/// already reaches for.
impl Type<Postgres> for Wei {
	fn type_info() -> PgTypeInfo {
		<BigDecimal as Type<Postgres>>::type_info()
	}
}

impl<'r> Decode<'r, Postgres> for Wei {
	fn decode(value: PgValueRef<'r>) -> Result<Self, Box<dyn std::error::Error + 'static + Send + Sync>> {
		let decimal = <BigDecimal as Decode<Postgres>>::decode(value)?;
		let digits = decimal.to_string();
		Ok(Wei(digits.parse()?))
	}
}

impl<'q> Encode<'q, Postgres> for Wei {
	fn encode_by_ref(
		&self,
		buf: &mut PgArgumentBuffer,
	) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
		let decimal: BigDecimal = self.0.to_string().parse()?;
		<BigDecimal as Encode<Postgres>>::encode_by_ref(&decimal, buf)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn human_roundtrip() {
		let w = Wei::from_human("12.5", 18).unwrap();
		assert_eq!(w.to_human(18), "12.500000000000000000");
	}

	#[test]
	fn rejects_excess_precision() {
		assert!(Wei::from_human("1.23", 1).is_none());
	}

	#[test]
	fn checked_sub_underflow() {
		assert_eq!(Wei(1).checked_sub(Wei(2)), None);
	}
}
