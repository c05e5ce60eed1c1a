use clap::{Arg, ArgAction, Command};
use std::io::{self, Write};

const HEADER: &str =
    "name.firstName,name.lastName,age,address.line1,address.line2,address.city,address.state,gender";

const FIRST: [&str; 6] = ["Rohit", "Anita", "John", "Mei", "Olu", "Sara"];
const LAST: [&str; 5] = ["Prasad", "Doe", "O'Neil", "Chen", "Adeyemi"];
const CITIES: [&str; 4] = ["Pune", "Leeds", "Lagos", "Austin"];

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a synthetic users CSV with dot-path headers to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("no_header")
                .long("no-header")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quoted")
                .long("quoted")
                .help("Quote address lines and embed delimiters and escaped quotes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ragged_every")
                .long("ragged-every")
                .help("Every Nth row stops after the age column")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let rows: u64 = *matches.get_one("rows").unwrap();
    let quoted = matches.get_flag("quoted");
    let ragged_every = matches.get_one::<u64>("ragged_every").copied();

    let mut out = io::BufWriter::new(io::stdout().lock());

    if !matches.get_flag("no_header") {
        writeln!(&mut out, "{HEADER}")?;
    }

    // Deterministic data: ages cycle 0..=89 so every band is populated
    for i in 0..rows {
        let first = FIRST[(i % FIRST.len() as u64) as usize];
        let last = LAST[(i % LAST.len() as u64) as usize];
        let age = i % 90;
        write!(&mut out, "{first},{last},{age}")?;

        if ragged_every.is_some_and(|n| n > 0 && i % n == n - 1) {
            writeln!(&mut out)?;
            continue;
        }

        let city = CITIES[(i % CITIES.len() as u64) as usize];
        let gender = if i % 2 == 0 { "female" } else { "male" };
        if quoted {
            write!(
                &mut out,
                ",\"{} Main St, Apt {}\",\"Block \"\"{}\"\"\",{city},ST,{gender}",
                i,
                i % 40,
                (b'A' + (i % 26) as u8) as char
            )?;
        } else {
            write!(&mut out, ",{} Main St,Apt {},{city},ST,{gender}", i, i % 40)?;
        }
        writeln!(&mut out)?;

        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
