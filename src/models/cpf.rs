use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Brazilian individual taxpayer registry number, normalized to its
/// eleven digits. Construction through [`Cpf::parse`] verifies both
/// check digits, so a held `Cpf` is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cpf(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CPF: '{0}'")]
pub struct InvalidCpf(String);

impl Cpf {
    /// Parses a CPF from its formatted ("529.982.247-25") or bare
    /// ("52998224725") representation.
    pub fn parse(input: &str) -> Result<Self, InvalidCpf> {
        let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
        if digits.len() != 11 {
            return Err(InvalidCpf(input.to_string()));
        }
        // Sequences of a single repeated digit pass the check-digit math
        // but are not issued.
        if digits.iter().all(|&d| d == digits[0]) {
            return Err(InvalidCpf(input.to_string()));
        }
        if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
            return Err(InvalidCpf(input.to_string()));
        }
        Ok(Cpf(digits.iter().map(|d| d.to_string()).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Modulo-11 check digit over the first `n` digits, weighted n+1 down
/// to 2; results above 9 collapse to 0.
fn check_digit(digits: &[u32]) -> u32 {
    let start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| d * (start - i as u32))
        .sum();
    let digit = 11 - (sum % 11);
    if digit > 9 {
        0
    } else {
        digit
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cpf {
    type Err = InvalidCpf;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cpf::parse(s)
    }
}
