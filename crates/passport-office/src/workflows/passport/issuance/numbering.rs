use rand::Rng;

use crate::workflows::passport::domain::PassportNumber;

/// Supplies candidate passport numbers. Candidates may collide; callers check the store.
pub trait PassportNumberSource: Send + Sync {
    fn candidate(&self) -> PassportNumber;
}

/// `P` followed by eight random digits.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPassportNumbers;

impl PassportNumberSource for RandomPassportNumbers {
    fn candidate(&self) -> PassportNumber {
        let digits: u32 = rand::thread_rng().gen_range(0..100_000_000);
        PassportNumber(format!("P{digits:08}"))
    }
}

/// True when `number` has the issued format.
pub fn is_well_formed(number: &PassportNumber) -> bool {
    let raw = number.0.as_str();
    raw.len() == 9
        && raw.starts_with('P')
        && raw[1..].chars().all(|c| c.is_ascii_digit())
}
