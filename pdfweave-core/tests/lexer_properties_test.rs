//! Property-based tests for the lexer
//!
//! Numbers, names and strings written in PDF syntax come back as the same
//! values, and arbitrary bytes never make the lexer panic.

use pdfweave::parser::{Lexer, Token};
use proptest::prelude::*;

fn lex_one(source: &str) -> Token {
    Lexer::new(source.as_bytes().to_vec())
        .next_valid_token()
        .unwrap()
}

fn pdf_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9._-]{0,40}"
}

proptest! {
    #[test]
    fn integers_round_trip(n in any::<i64>()) {
        prop_assert_eq!(lex_one(&n.to_string()), Token::Integer(n));
    }

    #[test]
    fn reals_round_trip(value in -1.0e6..1.0e6f64, decimals in 1usize..6) {
        let text = format!("{value:.decimals$}");
        let expected: f64 = text.parse().unwrap();
        prop_assert_eq!(lex_one(&text), Token::Real(expected));
    }

    #[test]
    fn names_round_trip(name in pdf_name_strategy()) {
        prop_assert_eq!(lex_one(&format!("/{name}")), Token::Name(name));
    }

    #[test]
    fn literal_strings_round_trip(text in "[a-zA-Z0-9 ]{0,60}") {
        prop_assert_eq!(lex_one(&format!("({text})")), Token::String(text.into_bytes()));
    }

    #[test]
    fn references_are_folded(num in any::<u32>(), gen in any::<u16>()) {
        let mut lexer = Lexer::new(format!("{num} {gen} R /Next").into_bytes());
        prop_assert_eq!(lexer.next_valid_token().unwrap(), Token::Reference(num, gen));
        prop_assert_eq!(lexer.next_valid_token().unwrap(), Token::Name("Next".to_string()));
    }

    #[test]
    fn integer_pairs_without_r_stay_integers(a in 0u32..100_000, b in 0u16..1000) {
        let mut lexer = Lexer::new(format!("{a} {b} obj").into_bytes());
        prop_assert_eq!(lexer.next_valid_token().unwrap(), Token::Integer(i64::from(a)));
        prop_assert_eq!(lexer.next_valid_token().unwrap(), Token::Integer(i64::from(b)));
    }

    #[test]
    fn arbitrary_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let limit = bytes.len() + 2;
        let mut lexer = Lexer::new(bytes);
        for _ in 0..limit {
            match lexer.next_token() {
                Ok(Token::Eof) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }
}
