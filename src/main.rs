use std::env;
use std::fs;
use std::process;

use scoreblock::Bar;

fn summarize(bars: &[Bar]) -> String {
    let mut out = String::new();
    for (i, bar) in bars.iter().enumerate() {
        out.push_str(&format!(
            "bar {:>4}  at {:>8}ms  {:>6}ms  {} voices\n",
            i + 1,
            bar.abs_position_ms(),
            bar.duration_ms(),
            bar.voices().len()
        ));
    }
    out
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: scoreblock <plan.yaml> [output.yaml]");
        eprintln!("       scoreblock --summary <plan.yaml> [output.txt]");
        process::exit(1);
    }

    let mut summary = false;
    let mut input_path = &args[1];
    let mut output_path: Option<&String> = args.get(2);

    // Parse flags
    if args[1] == "--summary" {
        summary = true;
        if args.len() < 3 {
            eprintln!("Usage: scoreblock --summary <plan.yaml> [output.txt]");
            process::exit(1);
        }
        input_path = &args[2];
        output_path = args.get(3);
    }

    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    let bars = match scoreblock::build_bars(&source) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("Error building bars: {}", e);
            process::exit(1);
        }
    };

    let text = if summary {
        summarize(&bars)
    } else {
        match scoreblock::bars_to_yaml(&bars) {
            Ok(yaml) => yaml,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &text) {
                eprintln!("Error writing to '{}': {}", path, e);
                process::exit(1);
            }
            eprintln!("Wrote {} bars to {}", bars.len(), path);
        }
        None => {
            print!("{}", text);
        }
    }
}
