use clap::Parser;
use rand::Rng;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use gridfill::builder::{build_grid, GridLayout};
use gridfill::context::SearchContext;
use gridfill::dictionary::Dictionary;
use gridfill::grid::Grid;
use gridfill::search::{
    find_solutions, PerfReport, SearchHandler, SearchOptions, SearchOutcome, SearchParams,
    SolverAction, Statistics,
};

/// gridfill: enumerate fillings of generalized crossword grids
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, rename_all = "snake_case")]
struct Args {
    /// Path to the grid file (black-square or bar-delimited; auto-detected)
    #[arg(long)]
    grid_file: String,

    /// Path to the word list, one lowercase word per line
    #[arg(long, default_value = "words")]
    word_list: String,

    /// Path to the veto list; missing file means no vetoes
    #[arg(long, default_value = "vetoed_words")]
    veto_file: String,

    /// File that the `s` command appends solutions to
    #[arg(long, default_value = "solutions")]
    solution_file: String,

    /// Permit the same word in more than one slot
    #[arg(long)]
    allow_dups: bool,

    /// Backjump past slots that couldn't have affected a dead end
    #[arg(long)]
    backjump: bool,

    /// Prune candidate lists using conflict information
    #[arg(long)]
    prune: bool,

    /// Also load each word's reversal
    #[arg(long)]
    reverse: bool,

    /// Shuffle word lists with a random seed instead of the fixed default
    #[arg(long)]
    shuffle: bool,

    /// Print the grid structure and exit
    #[arg(long)]
    show_grid: bool,

    /// Redraw progress in place with terminal escapes
    #[arg(long)]
    curses: bool,

    /// Emit a JSON report at the first solution (or timeout) and exit
    #[arg(long)]
    perf: bool,

    /// Report word counts and search milestones
    #[arg(long)]
    verbose_search: bool,

    /// Report each prune as it happens
    #[arg(long)]
    verbose_prune: bool,

    /// Give up after this many seconds
    #[arg(long)]
    max_time: Option<f64>,

    /// Word installations between timeout checks and progress redraws
    #[arg(long, default_value_t = 10_000)]
    step_period: u64,
}

struct Error(String);

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0) // Print error unquoted
    }
}

/// The interactive host: renders solutions, runs the between-solutions
/// command prompt, and maintains the solution and veto files.
struct Host {
    layout: GridLayout,
    args: Args,
}

impl Host {
    fn append_solution(&self, grid: &Grid) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.args.solution_file)?;
        writeln!(file, "{}\n", self.layout.render(grid))?;
        Ok(())
    }

    fn veto_word(&self, word: &str, ctx: &mut SearchContext) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.args.veto_file)?;
        writeln!(file, "{word}")?;
        let dictionary =
            Dictionary::load(&self.args.word_list, &self.args.veto_file, self.args.reverse)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        ctx.replace_dictionary(dictionary);
        Ok(())
    }
}

impl SearchHandler for Host {
    fn on_solution(
        &mut self,
        grid: &Grid,
        ctx: &mut SearchContext,
        stats: &Statistics,
    ) -> SolverAction {
        if self.args.perf {
            let report = PerfReport::new(true, stats);
            println!(
                "{}",
                serde_json::to_string(&report).expect("perf report serializes")
            );
            return SolverAction::Exit;
        }

        if self.args.curses {
            print!("\x1b[2J\x1b[H");
        }
        println!("\nSolution found:");
        println!("{}", self.layout.render(grid));
        println!("CPU time: {:.3}", stats.elapsed.as_secs_f64());
        println!("Steps: {}", stats.nsteps);

        let stdin = io::stdin();
        loop {
            print!(
                "enter command\n\
                 <CR>: next solution\n\
                 s: append solution to file\n\
                 v word: add word to veto list and restart\n\
                 r: restart with new random word order\n\
                 q: quit\n> "
            );
            let _ = io::stdout().flush();

            let mut buf = String::new();
            match stdin.lock().read_line(&mut buf) {
                Ok(0) | Err(_) => return SolverAction::Exit,
                Ok(_) => {}
            }
            let command = buf.trim_end();
            if command.is_empty() {
                return SolverAction::Continue;
            } else if command == "r" {
                return SolverAction::Restart;
            } else if command == "q" {
                return SolverAction::Exit;
            } else if command == "s" {
                if let Err(e) = self.append_solution(grid) {
                    eprintln!("can't append solution: {e}");
                }
            } else if let Some(word) = command.strip_prefix("v ") {
                match self.veto_word(word.trim(), ctx) {
                    Ok(()) => return SolverAction::Restart,
                    Err(e) => eprintln!("can't veto \"{word}\": {e}"),
                }
            } else {
                println!("bad command {command}");
            }
        }
    }

    fn on_progress(&mut self, grid: &Grid, _ctx: &SearchContext) {
        if self.args.perf {
            return;
        }
        if self.args.curses {
            print!("\x1b[2J\x1b[H{}\n", self.layout.render(grid));
            let _ = io::stdout().flush();
        } else if self.args.verbose_search {
            println!("{}\n", self.layout.render(grid));
        }
    }
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    let start = Instant::now();

    let dictionary = Dictionary::load(&args.word_list, &args.veto_file, args.reverse)
        .map_err(|e| Error(e.to_string()))?;
    if args.verbose_search {
        for (length, count) in dictionary.counts() {
            println!("{length}: {count}");
        }
    }

    let seed = if args.shuffle {
        rand::thread_rng().gen()
    } else {
        0
    };
    let mut ctx = SearchContext::new(dictionary, seed);
    ctx.reshuffle();

    let contents =
        fs::read_to_string(&args.grid_file).map_err(|_| Error(format!(
            "Can't read grid file: \"{}\"",
            args.grid_file
        )))?;
    let (mut grid, layout) = build_grid(&contents).map_err(|e| Error(e.to_string()))?;
    grid.prepare(&mut ctx);

    if args.show_grid {
        print!("{}", grid.describe());
        return Ok(());
    }

    let opts = SearchOptions {
        allow_dups: args.allow_dups,
        backjump: args.backjump,
        prune: args.prune,
        verbose_prune: args.verbose_prune,
    };
    let params = SearchParams {
        max_time: args.max_time.map(Duration::from_secs_f64),
        step_period: args.step_period,
    };

    let perf = args.perf;
    let mut host = Host { layout, args };
    let outcome = find_solutions(&mut grid, &mut ctx, &opts, &params, &mut host);

    match outcome {
        SearchOutcome::Exhausted => println!("no more solutions"),
        SearchOutcome::Timeout => {
            if perf {
                let stats = Statistics {
                    nsteps: grid.nsteps,
                    elapsed: start.elapsed(),
                };
                let report = PerfReport::new(false, &stats);
                println!(
                    "{}",
                    serde_json::to_string(&report).expect("perf report serializes")
                );
            } else {
                println!("max time exceeded");
            }
        }
        SearchOutcome::Stopped => {}
    }
    Ok(())
}
