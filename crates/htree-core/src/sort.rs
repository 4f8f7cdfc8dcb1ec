//! Natural, case-insensitive label ordering (§4.4 stage 9, §8 invariant 8).
//!
//! Splits each label into runs of digits and non-digits and compares
//! digit runs numerically, so "item2" sorts before "item10".

use std::cmp::Ordering;

/// Compare two labels the way the sort stage orders siblings: natural,
/// case-insensitive.
pub fn natural_case_insensitive_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ac), Some(&bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let a_run = take_digits(&mut ai);
                    let b_run = take_digits(&mut bi);
                    let a_num = a_run.trim_start_matches('0');
                    let b_num = b_run.trim_start_matches('0');
                    match a_num.len().cmp(&b_num.len()) {
                        Ordering::Equal => match a_num.cmp(b_num) {
                            Ordering::Equal => continue,
                            other => return other,
                        },
                        other => return other,
                    }
                } else {
                    let al = ac.to_ascii_lowercase();
                    let bl = bc.to_ascii_lowercase();
                    match al.cmp(&bl) {
                        Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_digits(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = iter.peek() {
        if c.is_ascii_digit() {
            out.push(c);
            iter.next();
        } else {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_alphabetically_case_insensitive() {
        assert_eq!(natural_case_insensitive_cmp("alpha", "beta"), Ordering::Less);
        assert_eq!(natural_case_insensitive_cmp("Alpha", "alpha"), Ordering::Equal);
    }

    #[test]
    fn orders_numeric_runs_by_value_not_lexically() {
        assert_eq!(natural_case_insensitive_cmp("item2", "item10"), Ordering::Less);
        assert_eq!(natural_case_insensitive_cmp("item10", "item2"), Ordering::Greater);
        assert_eq!(natural_case_insensitive_cmp("item02", "item2"), Ordering::Equal);
    }

    #[test]
    fn s1_scenario_orders_alpha_before_beta() {
        let mut labels = vec!["beta".to_string(), "alpha".to_string()];
        labels.sort_by(|a, b| natural_case_insensitive_cmp(a, b));
        assert_eq!(labels, vec!["alpha", "beta"]);
    }
}
