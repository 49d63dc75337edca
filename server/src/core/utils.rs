//! Small shared helpers.

use rand::RngExt;

use crate::prelude::*;

pub const ID_LENGTH: usize = 24;
pub const SAFE: [char; 62] = [
	'0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
	'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
	'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

pub fn random_id() -> String {
	let mut rng = rand::rng();
	let mut result = String::with_capacity(ID_LENGTH);

	for _ in 0..ID_LENGTH {
		result.push(SAFE[rng.random_range(0..SAFE.len())]);
	}
	result
}

/// Parses a human size literal (`"25mb"`, `"1gb"`, `"512kib"`, `"4096"`)
/// into a byte count. Decimal suffixes are powers of 1000, IEC suffixes
/// powers of 1024.
pub fn parse_size(literal: &str) -> WrResult<u64> {
	let s = literal.trim().to_ascii_lowercase();
	let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
	let (num, suffix) = s.split_at(split);
	let num: u64 = num
		.parse()
		.map_err(|_| Error::Validation(format!("invalid size literal: '{}'", literal)))?;

	let mult = match suffix.trim() {
		"" | "b" => 1,
		"kb" => 1000,
		"mb" => 1000 * 1000,
		"gb" => 1000 * 1000 * 1000,
		"kib" => 1024,
		"mib" => 1024 * 1024,
		"gib" => 1024 * 1024 * 1024,
		other => {
			return Err(Error::Validation(format!("invalid size suffix: '{}'", other)));
		}
	};

	num.checked_mul(mult)
		.ok_or_else(|| Error::Validation(format!("size literal overflows: '{}'", literal)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_decimal_and_iec_suffixes() {
		assert_eq!(parse_size("4096").unwrap(), 4096);
		assert_eq!(parse_size("1kb").unwrap(), 1000);
		assert_eq!(parse_size("25mb").unwrap(), 25_000_000);
		assert_eq!(parse_size("1gb").unwrap(), 1_000_000_000);
		assert_eq!(parse_size("2kib").unwrap(), 2048);
		assert_eq!(parse_size("3mib").unwrap(), 3 * 1024 * 1024);
		assert_eq!(parse_size("1gib").unwrap(), 1024 * 1024 * 1024);
		assert_eq!(parse_size(" 10 MB ").unwrap(), 10_000_000);
	}

	#[test]
	fn rejects_garbage() {
		assert!(parse_size("").is_err());
		assert!(parse_size("mb").is_err());
		assert!(parse_size("10tb").is_err());
		assert!(parse_size("-5mb").is_err());
	}

	#[test]
	fn random_ids_are_distinct() {
		assert_eq!(random_id().len(), ID_LENGTH);
		assert_ne!(random_id(), random_id());
	}
}

// vim: ts=4
