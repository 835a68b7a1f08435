//! Game code generation.

use rand::Rng;

/// Produces the six-digit code a host shows to prospective players.
///
/// `Send` so a session can move into the node's task.
pub trait CodeGenerator: Send {
    fn next_code(&mut self) -> String;
}

impl<G: CodeGenerator + ?Sized> CodeGenerator for Box<G> {
    fn next_code(&mut self) -> String {
        (**self).next_code()
    }
}

/// Uniformly random codes in `100000..=999999`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn next_code(&mut self) -> String {
        rand::rng().random_range(100_000..=999_999u32).to_string()
    }
}

/// Hands out a predetermined list of codes in order, cycling when it
/// runs out. Used for tests and reproducible demos.
#[derive(Debug, Clone)]
pub struct FixedCodes {
    codes: Vec<String>,
    next: usize,
}

impl FixedCodes {
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            next: 0,
        }
    }
}

impl CodeGenerator for FixedCodes {
    fn next_code(&mut self) -> String {
        if self.codes.is_empty() {
            return RandomCodes.next_code();
        }
        let code = self.codes[self.next % self.codes.len()].clone();
        self.next += 1;
        code
    }
}

/// Whether `code` has the shape of a game code: six ASCII digits, no
/// leading zero.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == 6
        && code.bytes().all(|b| b.is_ascii_digit())
        && !code.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_codes_are_six_digits_in_range() {
        let mut codes = RandomCodes;
        for _ in 0..1000 {
            let code = codes.next_code();
            assert!(is_valid_code(&code), "{code}");
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_fixed_codes_cycle_in_order() {
        let mut codes = FixedCodes::new(["111111", "222222"]);
        assert_eq!(codes.next_code(), "111111");
        assert_eq!(codes.next_code(), "222222");
        assert_eq!(codes.next_code(), "111111");
    }

    #[test]
    fn test_fixed_codes_empty_falls_back_to_random() {
        let mut codes = FixedCodes::new(Vec::<String>::new());
        assert!(is_valid_code(&codes.next_code()));
    }

    #[test]
    fn test_is_valid_code_rejects_malformed() {
        assert!(is_valid_code("123456"));
        assert!(!is_valid_code("012345"));
        assert!(!is_valid_code("12345"));
        assert!(!is_valid_code("1234567"));
        assert!(!is_valid_code("12a456"));
    }
}
