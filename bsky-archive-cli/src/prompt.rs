//! Interactive terminal prompts.

use anyhow::{bail, Context, Result};
use bsky_archive_lib::links::clean_input;
use std::io::{self, BufRead, Write};

/// Print `question` and read one cleaned line from stdin.
pub fn ask(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        bail!("stdin closed while waiting for input");
    }
    Ok(clean_input(&line))
}

pub fn confirm(question: &str) -> Result<bool> {
    Ok(ask(question)?.eq_ignore_ascii_case("y"))
}

/// A count, or `default` when the answer is not a plain number.
pub fn count_or(question: &str, default: usize) -> Result<usize> {
    Ok(parse_count(&ask(question)?).unwrap_or(default))
}

/// A count, or `None` ("no limit") when the answer is not a plain number.
pub fn optional_count(question: &str) -> Result<Option<usize>> {
    Ok(parse_count(&ask(question)?))
}

/// Ask until a number greater than zero is given.
pub fn positive_count(question: &str) -> Result<usize> {
    loop {
        match ask(question)?.parse::<usize>() {
            Ok(n) if n > 0 => return Ok(n),
            Ok(_) => println!("Please enter a number greater than 0."),
            Err(_) => println!("Invalid input. Please enter a whole number."),
        }
    }
}

/// Show a numbered list and let the user pick an entry; `0` cancels.
pub fn choose<'a, T>(
    title: &str,
    items: &'a [T],
    label: impl Fn(usize, &T) -> String,
) -> Result<Option<&'a T>> {
    println!("\n{}", title);
    for (i, item) in items.iter().enumerate() {
        println!("[{}] {}", i + 1, label(i, item));
    }
    println!("[0] Cancel");

    loop {
        match parse_choice(&ask("Enter a number: ")?, items.len()) {
            Choice::Cancel => return Ok(None),
            Choice::Pick(idx) => return Ok(items.get(idx)),
            Choice::Invalid => println!("Invalid number. Please try again."),
        }
    }
}

fn parse_count(input: &str) -> Option<usize> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Cancel,
    Pick(usize),
    Invalid,
}

fn parse_choice(input: &str, len: usize) -> Choice {
    match input.trim().parse::<usize>() {
        Ok(0) => Choice::Cancel,
        Ok(n) if n <= len => Choice::Pick(n - 1),
        _ => Choice::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("500"), Some(500));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("-5"), None);
        assert_eq!(parse_count("1e3"), None);
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("0", 3), Choice::Cancel);
        assert_eq!(parse_choice("1", 3), Choice::Pick(0));
        assert_eq!(parse_choice(" 3 ", 3), Choice::Pick(2));
        assert_eq!(parse_choice("4", 3), Choice::Invalid);
        assert_eq!(parse_choice("two", 3), Choice::Invalid);
    }
}
