use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    folders: Vec<PathBuf>,
    documents: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    match randplay::logging::init() {
        Ok(path) => log::info!("logging to {}", path.display()),
        Err(err) => eprintln!("logging disabled: {err:#}"),
    }

    randplay::app::run_with_startup(randplay::app::AppStartupOptions {
        folders: args.folders,
        documents: args.documents,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            flag @ ("--folder" | "--load") => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("{flag} requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                let path = PathBuf::from(value.trim());
                if flag == "--folder" {
                    out.folders.push(path);
                } else {
                    out.documents.push(path);
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("randplay - shuffle player with a no-repeat window");
    println!("  --folder <path>   Scan a music folder into the pool (repeatable)");
    println!("  --load <file>     Add a JSON playlist document to the pool (repeatable)");
    println!();
    println!("Settings live in $RANDPLAY_CONFIG_DIR or ~/.config/randplay;");
    println!("set RANDPLAY_LOG to change the log filter.");
}
