use anyhow::Result;
use std::io::{self, BufRead, Write};

/// First whitespace-delimited token of `line`, parsed as a number.
fn parse_input(line: &str) -> Option<f64> {
    line.split_whitespace().next()?.parse().ok()
}

fn format_square(value: f64) -> String {
    format!("✅ Результат: {:.2}² = {:.2}", value, value * value)
}

fn main() -> Result<()> {
    print!("Введите число: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    match parse_input(&line) {
        Some(value) => println!("{}", format_square(value)),
        None => println!("❌ Ошибка: введите корректное число"),
    }

    Ok(())
}
