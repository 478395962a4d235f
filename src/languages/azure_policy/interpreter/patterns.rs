// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// `*`
    Sequence,
    /// `.` in match patterns.
    AnyChar,
    /// `#` in match patterns.
    Digit,
    /// `?` in match patterns.
    Letter,
    Char(char),
}

/// `like` pattern: `*` matches any sequence, everything else literally.
/// Comparison ignores case.
pub(super) fn like(value: &str, pattern: &str) -> bool {
    let tokens: Vec<Token> = pattern
        .chars()
        .map(|c| match c {
            '*' => Token::Sequence,
            c => Token::Char(c),
        })
        .collect();
    wildcard_match(&tokens, value, false)
}

/// `match` pattern: `#` digit, `?` letter, `.` any character, `*` any
/// sequence, everything else literally. The whole value must match.
pub(super) fn matches(value: &str, pattern: &str, case_sensitive: bool) -> bool {
    let tokens: Vec<Token> = pattern
        .chars()
        .map(|c| match c {
            '*' => Token::Sequence,
            '.' => Token::AnyChar,
            '#' => Token::Digit,
            '?' => Token::Letter,
            c => Token::Char(c),
        })
        .collect();
    wildcard_match(&tokens, value, case_sensitive)
}

fn token_matches(token: Token, c: char, case_sensitive: bool) -> bool {
    match token {
        Token::Sequence | Token::AnyChar => true,
        Token::Digit => c.is_ascii_digit(),
        Token::Letter => c.is_alphabetic(),
        Token::Char(expected) if case_sensitive => expected == c,
        Token::Char(expected) => {
            expected == c || expected.to_lowercase().eq(c.to_lowercase())
        }
    }
}

// Greedy matcher that backtracks to the most recent `*`.
fn wildcard_match(pattern: &[Token], value: &str, case_sensitive: bool) -> bool {
    let value: Vec<char> = value.chars().collect();
    let (mut p, mut v) = (0_usize, 0_usize);
    // Pattern index after the last `*` and the value index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while let Some(&c) = value.get(v) {
        match pattern.get(p) {
            Some(Token::Sequence) => {
                p += 1;
                backtrack = Some((p, v));
                continue;
            }
            Some(&token) if token_matches(token, c, case_sensitive) => {
                p += 1;
                v += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((resume, tried)) => {
                p = resume;
                v = tried + 1;
                backtrack = Some((resume, v));
            }
            None => return false,
        }
    }

    pattern
        .get(p..)
        .is_some_and(|rest| rest.iter().all(|t| *t == Token::Sequence))
}
