//! Logical ↔ native path translation
//!
//! Logical paths separate components with `.`. Backends that reserve `.`
//! (table names, file names) use another separator. Translation is a
//! two-sided inverse on every path it accepts; anything that would not
//! round-trip is rejected up front.

use super::errors::{PhysicalError, PhysicalResult};

/// Logical component separator
pub const LOGICAL_SEPARATOR: char = '.';

/// Bijective separator swap between logical and native names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTranslator {
    logical: char,
    native: char,
}

impl PathTranslator {
    pub fn new(native: char) -> Self {
        Self {
            logical: LOGICAL_SEPARATOR,
            native,
        }
    }

    pub fn native_separator(&self) -> char {
        self.native
    }

    pub fn to_native(&self, path: &str) -> PhysicalResult<String> {
        self.check(path, self.logical, self.native)?;
        Ok(path.replace(self.logical, &self.native.to_string()))
    }

    pub fn from_native(&self, name: &str) -> PhysicalResult<String> {
        self.check(name, self.native, self.logical)?;
        Ok(name.replace(self.native, &self.logical.to_string()))
    }

    fn check(&self, name: &str, separator: char, reserved: char) -> PhysicalResult<()> {
        if name.contains(reserved) {
            return Err(PhysicalError::invalid_path(
                name,
                format!("contains reserved separator '{}'", reserved),
            ));
        }
        if name.split(separator).any(str::is_empty) {
            return Err(PhysicalError::invalid_path(name, "empty path component"));
        }
        Ok(())
    }
}

impl Default for PathTranslator {
    fn default() -> Self {
        Self::new('$')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let t = PathTranslator::default();
        for path in ["room1.temp", "a", "a.b.c.d", "dev_1.s-2"] {
            let native = t.to_native(path).unwrap();
            assert!(!native.contains('.'));
            assert_eq!(t.from_native(&native).unwrap(), path);
        }
        assert_eq!(t.to_native("room1.temp").unwrap(), "room1$temp");
    }

    #[test]
    fn test_rejects_native_separator_in_component() {
        let t = PathTranslator::default();
        let err = t.to_native("room$1.temp").unwrap_err();
        assert_eq!(err.code(), "POLY_PHYSICAL_INVALID_PATH");
        assert!(t.from_native("room1.temp").is_err());
    }

    #[test]
    fn test_rejects_empty_component() {
        let t = PathTranslator::default();
        assert!(t.to_native("").is_err());
        assert!(t.to_native("room1..temp").is_err());
        assert!(t.to_native(".temp").is_err());
        assert!(t.from_native("room1$").is_err());
    }
}
