//! Spoken-English rendering of numbers for the normalizer.

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

// u64::MAX is about 1.8e19, so quintillion is the largest scale needed
const SCALES: [(u64, &str); 6] = [
    (1_000_000_000_000_000_000, "quintillion"),
    (1_000_000_000_000_000, "quadrillion"),
    (1_000_000_000_000, "trillion"),
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
];

/// Converts an integer to words, e.g. `1204` → `one thousand two hundred four`.
pub fn integer_to_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut remaining = n;

    for (scale, name) in SCALES {
        if remaining >= scale {
            parts.push(format!("{} {name}", below_thousand(remaining / scale)));
            remaining %= scale;
        }
    }

    if remaining > 0 {
        parts.push(below_thousand(remaining));
    }

    parts.join(" ")
}

fn below_thousand(n: u64) -> String {
    debug_assert!(n < 1000);
    let mut words = Vec::new();

    let hundreds = n / 100;
    let rest = n % 100;
    if hundreds > 0 {
        words.push(format!("{} hundred", ONES[hundreds as usize]));
    }

    if rest >= 20 {
        let tens = TENS[(rest / 10) as usize];
        match rest % 10 {
            0 => words.push(tens.to_string()),
            unit => words.push(format!("{tens} {}", ONES[unit as usize])),
        }
    } else if rest > 0 {
        words.push(ONES[rest as usize].to_string());
    }

    words.join(" ")
}

/// Renders a numeric literal such as `1,250` or `3.14` as words. Digits after
/// a decimal point are read one by one. Returns `None` when the literal does
/// not fit in a `u64`.
pub fn number_to_words(literal: &str) -> Option<String> {
    let cleaned: String = literal.chars().filter(|c| *c != ',').collect();
    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (cleaned.as_str(), None),
    };

    let mut words = integer_to_words(whole.parse().ok()?);
    if let Some(fraction) = fraction.filter(|f| !f.is_empty()) {
        words.push_str(" point");
        for digit in fraction.chars() {
            let value = digit.to_digit(10)?;
            words.push(' ');
            words.push_str(ONES[value as usize]);
        }
    }
    Some(words)
}
