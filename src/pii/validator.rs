//! Structural validators.
//!
//! Pattern matches that fail their validator are dropped, which is where
//! most of the engine's false-positive discipline comes from.

/// Luhn (mod-10) check over 13-19 decimal digits, separators stripped.
pub fn validate_luhn(number: &str) -> bool {
    let digits: Vec<u32> = number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let checksum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, &digit)| {
            if idx % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    checksum.is_multiple_of(10)
}

/// SSN issuance rules: area not 000/666/900-999, group not 00, serial not
/// 0000. Exactly nine digits after stripping separators.
pub fn validate_ssn(ssn: &str) -> bool {
    let digits: String = ssn.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return false;
    }

    let area: u16 = match digits[0..3].parse() {
        Ok(n) => n,
        Err(_) => return false,
    };
    let group: u16 = match digits[3..5].parse() {
        Ok(n) => n,
        Err(_) => return false,
    };
    let serial: u16 = match digits[5..9].parse() {
        Ok(n) => n,
        Err(_) => return false,
    };

    if area == 0 || area == 666 || area >= 900 {
        return false;
    }
    if group == 0 || serial == 0 {
        return false;
    }
    true
}

/// Email shape: one `@`, non-empty local part, dotted domain with non-empty
/// labels, no consecutive dots, TLD of at least two characters.
pub fn validate_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };

    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if local.contains("..") || domain.contains("..") {
        return false;
    }
    if !domain.contains('.') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    match labels.last() {
        Some(tld) => tld.len() >= 2,
        None => false,
    }
}

/// US phone: ten digits after normalization (eleven with a leading 1);
/// area code must not start with 0 or 1.
pub fn validate_phone(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        10 => &digits[..],
        11 if digits.starts_with('1') => &digits[1..],
        _ => return false,
    };

    let area: u16 = match national[0..3].parse() {
        Ok(n) => n,
        Err(_) => return false,
    };
    area >= 200
}
