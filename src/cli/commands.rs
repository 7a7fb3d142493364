//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - add/edit/favorite/delete: write a dream
//! - list/show/random: read dreams
//! - dates/months/stats: journal overviews

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Dreamlog - a local dream journal
#[derive(Parser, Debug)]
#[command(name = "dreamlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a new dream
    Add {
        /// What happened
        description: String,

        #[arg(short, long)]
        title: Option<String>,

        /// When it happened (RFC 3339); defaults to now
        #[arg(short, long)]
        date: Option<String>,

        /// Mood level 0-5
        #[arg(short, long)]
        mood: Option<i64>,

        /// Image URI, repeatable
        #[arg(long = "image")]
        images: Vec<String>,

        /// Voice memo URI
        #[arg(long)]
        audio: Option<String>,

        #[arg(short, long)]
        favorite: bool,
    },

    /// List dreams, newest first
    List {
        /// Case-insensitive text in title or description
        #[arg(short, long)]
        search: Option<String>,

        /// Only dreams on this day (YYYY-MM-DD)
        #[arg(short, long)]
        day: Option<NaiveDate>,

        /// Only favorites
        #[arg(short, long)]
        favorite: bool,

        /// Lowest mood level to include
        #[arg(long)]
        min_mood: Option<i64>,

        /// Highest mood level to include
        #[arg(long)]
        max_mood: Option<i64>,

        /// Oldest first
        #[arg(long)]
        asc: bool,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Show one dream in full
    Show {
        id: String,
    },

    /// Change fields of a dream
    Edit {
        id: String,

        #[arg(short, long, conflicts_with = "clear_title")]
        title: Option<String>,

        /// Remove the title
        #[arg(long)]
        clear_title: bool,

        #[arg(long)]
        description: Option<String>,

        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long, conflicts_with = "clear_mood")]
        mood: Option<i64>,

        /// Remove the mood
        #[arg(long)]
        clear_mood: bool,

        /// Replace images, repeatable
        #[arg(long = "image")]
        images: Option<Vec<String>>,

        #[arg(long)]
        audio: Option<String>,
    },

    /// Toggle the favorite flag
    Favorite {
        id: String,
    },

    /// Delete a dream
    Delete {
        id: String,
    },

    /// List the date of every dream
    Dates,

    /// Browse dreams grouped by month
    Months,

    /// Journal summary: counts, average mood, streak
    Stats,

    /// Show a random dream
    Random,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["dreamlog"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["dreamlog", "-v", "-c", "/path/to/dreamlog.yml", "stats"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/dreamlog.yml")));
    }

    #[test]
    fn test_add_command() {
        let cli = Cli::try_parse_from([
            "dreamlog",
            "add",
            "I was flying",
            "-t",
            "Flight",
            "-m",
            "4",
            "--image",
            "file:///a.png",
            "--image",
            "file:///b.png",
            "-f",
        ])
        .unwrap();
        match cli.command {
            Commands::Add {
                description,
                title,
                date,
                mood,
                images,
                audio,
                favorite,
            } => {
                assert_eq!(description, "I was flying");
                assert_eq!(title.as_deref(), Some("Flight"));
                assert!(date.is_none());
                assert_eq!(mood, Some(4));
                assert_eq!(images.len(), 2);
                assert!(audio.is_none());
                assert!(favorite);
            }
            _ => panic!("Expected add command"),
        }
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["dreamlog", "list"]).unwrap();
        match cli.command {
            Commands::List {
                search,
                day,
                favorite,
                asc,
                page,
                ..
            } => {
                assert!(search.is_none());
                assert!(day.is_none());
                assert!(!favorite);
                assert!(!asc);
                assert_eq!(page, 1);
            }
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_list_with_filters() {
        let cli = Cli::try_parse_from(["dreamlog", "list", "-s", "fly", "-d", "2024-03-01", "-f", "-p", "2"]).unwrap();
        match cli.command {
            Commands::List {
                search, day, favorite, page, ..
            } => {
                assert_eq!(search.as_deref(), Some("fly"));
                assert_eq!(day, NaiveDate::from_ymd_opt(2024, 3, 1));
                assert!(favorite);
                assert_eq!(page, 2);
            }
            _ => panic!("Expected list command"),
        }
    }

    #[test]
    fn test_list_rejects_bad_day() {
        assert!(Cli::try_parse_from(["dreamlog", "list", "-d", "yesterday"]).is_err());
    }

    #[test]
    fn test_edit_title_conflicts_with_clear() {
        assert!(Cli::try_parse_from(["dreamlog", "edit", "a1", "-t", "x", "--clear-title"]).is_err());
    }

    #[test]
    fn test_edit_command() {
        let cli = Cli::try_parse_from(["dreamlog", "edit", "a1", "--clear-mood", "--description", "new"]).unwrap();
        match cli.command {
            Commands::Edit {
                id,
                clear_mood,
                description,
                images,
                ..
            } => {
                assert_eq!(id, "a1");
                assert!(clear_mood);
                assert_eq!(description.as_deref(), Some("new"));
                assert!(images.is_none());
            }
            _ => panic!("Expected edit command"),
        }
    }

    #[test]
    fn test_id_commands() {
        for (name, expected) in [("show", "a1"), ("favorite", "a1"), ("delete", "a1")] {
            let cli = Cli::try_parse_from(["dreamlog", name, expected]).unwrap();
            let id = match cli.command {
                Commands::Show { id } | Commands::Favorite { id } | Commands::Delete { id } => id,
                _ => panic!("Expected {} command", name),
            };
            assert_eq!(id, expected);
        }
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["dreamlog", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
