//! The fixed set of math puzzles served to battle rounds, ported from the
//! site's problem bank, plus the numeric helpers their check predicates use.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;

/// Form answers as submitted by a player, keyed by input id. All values are
/// coerced to trimmed strings before reaching a check predicate.
pub type AnswerMap = HashMap<String, String>;

/// Outcome of a check predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub ok: bool,
    pub message: String,
}

/// A single form field the front-end renders for a problem.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemInput {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub input_type: &'static str,
    pub placeholder: &'static str,
}

/// One puzzle definition. The check predicate is a pure function of the
/// submitted answers; it never sees engine state. Serialization skips it so
/// the answer key can never leak through a view.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    pub id: &'static str,
    pub title: &'static str,
    pub difficulty: &'static str,
    pub statement: &'static str,
    pub inputs: Vec<ProblemInput>,
    #[serde(skip_serializing)]
    pub check: fn(&AnswerMap) -> CheckResult,
}

/// Coerces a JSON `answers` object into the string map predicates consume.
/// Anything that is not an object yields an empty map; predicates then fail
/// the submission on their own terms.
pub fn answers_from_value(value: Option<&serde_json::Value>) -> AnswerMap {
    let mut map = AnswerMap::new();
    if let Some(serde_json::Value::Object(fields)) = value {
        for (key, field) in fields {
            let text = match field {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => String::new(),
            };
            map.insert(key.clone(), text.trim().to_string());
        }
    }
    map
}

/// Runs a problem's check predicate, treating a panic as an incorrect
/// answer. A buggy predicate must never take a room down with it.
pub fn run_check(problem: &Problem, answers: &AnswerMap) -> CheckResult {
    match catch_unwind(AssertUnwindSafe(|| (problem.check)(answers))) {
        Ok(result) => result,
        Err(_) => {
            eprintln!(
                "Check predicate for problem {} panicked; treating the answer as incorrect",
                problem.id
            );
            CheckResult {
                ok: false,
                message: "判定中にエラーが発生しました。".to_string(),
            }
        }
    }
}

/// The problem bank. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Catalog {
    problems: Vec<Problem>,
}

impl Catalog {
    /// The standard four-problem set shipped with the site.
    pub fn standard() -> Catalog {
        Catalog {
            problems: standard_problems(),
        }
    }

    /// A catalog with an explicit problem list (tests use this).
    pub fn with_problems(problems: Vec<Problem>) -> Catalog {
        Catalog { problems }
    }

    pub fn get(&self, id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Problem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Numeric helpers shared by check predicates. Engine code treats these as
/// opaque; only predicates depend on them.
pub mod utils {
    /// Lenient numeric parse: empty or non-numeric input yields `None`.
    pub fn parse_num(value: &str) -> Option<f64> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => None,
        }
    }

    /// Float comparison with the same 1e-9 tolerance the site always used.
    pub fn eq_num(a: f64, b: f64) -> bool {
        a.is_finite() && b.is_finite() && (a - b).abs() < 1e-9
    }

    pub fn is_int(n: f64) -> bool {
        n.is_finite() && n.fract() == 0.0
    }

    pub fn gcd(a: i64, b: i64) -> i64 {
        let mut x = a.abs();
        let mut y = b.abs();
        while y != 0 {
            let tmp = y;
            y = x % y;
            x = tmp;
        }
        x
    }

    pub fn is_prime(n: i64) -> bool {
        if n < 2 {
            return false;
        }
        if n % 2 == 0 {
            return n == 2;
        }
        if n % 3 == 0 {
            return n == 3;
        }
        let limit = (n as f64).sqrt() as i64;
        let mut f = 5;
        while f <= limit {
            if n % f == 0 || n % (f + 2) == 0 {
                return false;
            }
            f += 6;
        }
        true
    }

    pub fn nth_prime(k: usize) -> i64 {
        let mut count = 0;
        let mut n: i64 = 1;
        while count < k {
            n += 1;
            if is_prime(n) {
                count += 1;
            }
        }
        n
    }

    /// Sum of multiples of `a` or `b` strictly below `limit`, by
    /// inclusion-exclusion over arithmetic series.
    pub fn sum_multiples_below(limit: i64, a: i64, b: i64) -> i64 {
        let sum_of = |step: i64| {
            let count = (limit - 1) / step;
            step * count * (count + 1) / 2
        };
        let lcm = a * b / gcd(a, b);
        sum_of(a) + sum_of(b) - sum_of(lcm)
    }
}

fn answer(answers: &AnswerMap, key: &str) -> Option<f64> {
    utils::parse_num(answers.get(key).map(String::as_str).unwrap_or(""))
}

fn standard_problems() -> Vec<Problem> {
    vec![
        Problem {
            id: "p1",
            title: "Multiples of 3 or 5 below 1000",
            difficulty: "Easy",
            statement: "1000 未満の自然数のうち、<code>3</code> または <code>5</code> の倍数の総和を求めてください。<br />Enter the total sum (an integer).",
            inputs: vec![ProblemInput {
                id: "ans",
                label: "Answer (整数)",
                input_type: "number",
                placeholder: "e.g. 233168",
            }],
            check: |answers| {
                let correct = utils::sum_multiples_below(1000, 3, 5) as f64;
                let ok = matches!(answer(answers, "ans"), Some(n) if utils::eq_num(n, correct));
                CheckResult {
                    ok,
                    message: if ok {
                        "正解です！".to_string()
                    } else {
                        "不正解です。包除原理を使って再確認してみましょう。".to_string()
                    },
                }
            },
        },
        Problem {
            id: "p2",
            title: "Find integers a, b (a + b = 10, ab = 21)",
            difficulty: "Easy",
            statement: "整数 <em>a</em>, <em>b</em> が <code>a + b = 10</code>, <code>ab = 21</code> を満たすようにしてください。順序は問いません。",
            inputs: vec![
                ProblemInput { id: "a", label: "a", input_type: "number", placeholder: "e.g. 3" },
                ProblemInput { id: "b", label: "b", input_type: "number", placeholder: "e.g. 7" },
            ],
            check: |answers| {
                let ok = match (answer(answers, "a"), answer(answers, "b")) {
                    (Some(a), Some(b)) => {
                        utils::is_int(a)
                            && utils::is_int(b)
                            && a + b == 10.0
                            && a * b == 21.0
                    }
                    _ => false,
                };
                CheckResult {
                    ok,
                    message: if ok {
                        "正解です！ (a, b) = (3, 7) または (7, 3) です。".to_string()
                    } else {
                        "条件をもう一度確認してみましょう。".to_string()
                    },
                }
            },
        },
        Problem {
            id: "p3",
            title: "Pythagorean triplet for which a + b + c = 1000",
            difficulty: "Hard",
            statement: "<em>a &lt; b &lt; c</em> を満たすピタゴラス数 <code>a^2 + b^2 = c^2</code> で、さらに <code>a + b + c = 1000</code> となる組 <code>(a, b, c)</code> を求め、3 つの値を入力してください（整数）。",
            inputs: vec![
                ProblemInput { id: "a", label: "a", input_type: "number", placeholder: "e.g. 200" },
                ProblemInput { id: "b", label: "b", input_type: "number", placeholder: "e.g. 375" },
                ProblemInput { id: "c", label: "c", input_type: "number", placeholder: "e.g. 425" },
            ],
            check: |answers| {
                let ok = match (answer(answers, "a"), answer(answers, "b"), answer(answers, "c")) {
                    (Some(a), Some(b), Some(c)) => {
                        a < b && b < c && a + b + c == 1000.0 && a * a + b * b == c * c
                    }
                    _ => false,
                };
                CheckResult {
                    ok,
                    message: if ok {
                        "正解です！ (200, 375, 425) が条件を満たします。".to_string()
                    } else {
                        "三平方の定理と和が 1000 になる条件を再確認してください。".to_string()
                    },
                }
            },
        },
        Problem {
            id: "p4",
            title: "The 10,001st prime",
            difficulty: "Medium",
            statement: "10,001 番目の素数を求めてください。",
            inputs: vec![ProblemInput {
                id: "ans",
                label: "Answer (整数)",
                input_type: "number",
                placeholder: "e.g. 104743",
            }],
            check: |answers| {
                let correct = utils::nth_prime(10_001) as f64;
                let ok = matches!(answer(answers, "ans"), Some(n) if utils::eq_num(n, correct));
                CheckResult {
                    ok,
                    message: if ok {
                        "正解です！".to_string()
                    } else {
                        "10,001 番目の素数をもう一度計算してみましょう。".to_string()
                    },
                }
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn utils_known_values() {
        assert_eq!(utils::sum_multiples_below(1000, 3, 5), 233_168);
        assert_eq!(utils::gcd(12, 18), 6);
        assert_eq!(utils::gcd(-12, 18), 6);
        assert!(utils::is_prime(2));
        assert!(utils::is_prime(104_743));
        assert!(!utils::is_prime(1));
        assert!(!utils::is_prime(104_744));
        assert_eq!(utils::nth_prime(6), 13);
    }

    #[test]
    fn parse_num_is_lenient() {
        assert_eq!(utils::parse_num(" 42 "), Some(42.0));
        assert_eq!(utils::parse_num(""), None);
        assert_eq!(utils::parse_num("abc"), None);
        assert_eq!(utils::parse_num("NaN"), None);
    }

    #[test]
    fn p1_accepts_the_known_sum() {
        let catalog = Catalog::standard();
        let p1 = catalog.get("p1").unwrap();
        assert!((p1.check)(&answers(&[("ans", "233168")])).ok);
        assert!(!(p1.check)(&answers(&[("ans", "233169")])).ok);
        assert!(!(p1.check)(&answers(&[])).ok);
    }

    #[test]
    fn p2_accepts_both_orders() {
        let catalog = Catalog::standard();
        let p2 = catalog.get("p2").unwrap();
        assert!((p2.check)(&answers(&[("a", "3"), ("b", "7")])).ok);
        assert!((p2.check)(&answers(&[("a", "7"), ("b", "3")])).ok);
        assert!(!(p2.check)(&answers(&[("a", "5"), ("b", "5")])).ok);
        assert!(!(p2.check)(&answers(&[("a", "3.5"), ("b", "6.5")])).ok);
    }

    #[test]
    fn p3_requires_the_ordered_triplet() {
        let catalog = Catalog::standard();
        let p3 = catalog.get("p3").unwrap();
        assert!((p3.check)(&answers(&[("a", "200"), ("b", "375"), ("c", "425")])).ok);
        assert!(!(p3.check)(&answers(&[("a", "375"), ("b", "200"), ("c", "425")])).ok);
        assert!(!(p3.check)(&answers(&[("a", "3"), ("b", "4"), ("c", "5")])).ok);
    }

    #[test]
    fn p4_matches_nth_prime() {
        let catalog = Catalog::standard();
        let p4 = catalog.get("p4").unwrap();
        assert!((p4.check)(&answers(&[("ans", "104743")])).ok);
        assert!(!(p4.check)(&answers(&[("ans", "104729")])).ok);
    }

    #[test]
    fn run_check_catches_panicking_predicates() {
        let bomb = Problem {
            id: "boom",
            title: "Boom",
            difficulty: "Easy",
            statement: "",
            inputs: vec![],
            check: |_| panic!("author bug"),
        };
        let result = run_check(&bomb, &AnswerMap::new());
        assert!(!result.ok);
    }

    #[test]
    fn catalog_lookup() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.get("p3").is_some());
        assert!(catalog.get("p9").is_none());
    }
}
