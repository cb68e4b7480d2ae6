//! Interactive MFA code entry.

use std::io::{BufRead, Write};

use anyhow::{Result, bail};

/// Prompts until a non-empty MFA code is entered.
///
/// The code is only checked for presence; STS is the authority on whether it is valid.
pub fn read_mfa_code(mut input: impl BufRead, mut output: impl Write, profile: &str) -> Result<String> {
    write!(output, "Enter MFA code for profile {profile}: ")?;
    loop {
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("No MFA code entered");
        }

        let code = line.trim();
        if !code.is_empty() {
            return Ok(code.to_string());
        }
        write!(output, "Please enter a valid MFA code: ")?;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reprompts_until_code_is_entered() {
        let mut output = Vec::new();
        let code = read_mfa_code(Cursor::new("\n   \n 123456 \n"), &mut output, "work").expect("code");

        assert_eq!(code, "123456");
        let shown = String::from_utf8(output).expect("utf8");
        assert!(shown.starts_with("Enter MFA code for profile work: "));
        assert_eq!(shown.matches("Please enter a valid MFA code: ").count(), 2);
    }

    #[test]
    fn end_of_input_is_an_error() {
        let err = read_mfa_code(Cursor::new("\n"), Vec::new(), "default").err().expect("error");
        assert_eq!(err.to_string(), "No MFA code entered");
    }
}
