#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Name-to-routine table and the dispatcher over it

use std::io::Write;

use tracing::{debug, info};

use crate::context::DemoContext;
use crate::demos;
use crate::error::Result;

/// Signature shared by every example routine
pub type Routine = fn(&mut DemoContext<'_>) -> Result<()>;

/// One registered example
#[derive(Debug, Clone, Copy)]
pub struct DemoEntry {
    name: &'static str,
    /// Older names the example still answers to; never listed
    aliases: &'static [&'static str],
    routine: Routine,
}

impl DemoEntry {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| *alias == name)
    }

    /// Invoke the routine
    ///
    /// # Errors
    ///
    /// Propagates whatever the routine returns
    pub fn run(&self, ctx: &mut DemoContext<'_>) -> Result<()> {
        (self.routine)(ctx)
    }
}

/// Every example, in listing order
pub static DEMOS: [DemoEntry; 7] = [
    DemoEntry {
        name: "assertion_example",
        aliases: &[],
        routine: demos::assertion_example,
    },
    DemoEntry {
        name: "timing_example",
        aliases: &[],
        routine: demos::timing_example,
    },
    DemoEntry {
        name: "callgraph_example",
        aliases: &["cprofile_example"],
        routine: demos::callgraph_example,
    },
    DemoEntry {
        name: "alloc_trace_example",
        aliases: &["tracemalloc_example"],
        routine: demos::alloc_trace_example,
    },
    DemoEntry {
        name: "line_memory_example",
        aliases: &["memory_profiler_example"],
        routine: demos::line_memory_example,
    },
    DemoEntry {
        name: "line_memory_efficient_example",
        aliases: &["memory_profiler_eficient_example"],
        routine: demos::line_memory_efficient_example,
    },
    DemoEntry {
        name: "rss_example",
        aliases: &["psutil_rss_example"],
        routine: demos::rss_example,
    },
];

/// What [`dispatch`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No name given; the names were listed
    Listed,
    /// The named routine ran to completion
    Ran(&'static str),
    /// The name was unknown; a message and the names were printed
    NotFound,
}

/// Find a registered example by exact name or alias
#[must_use]
pub fn lookup(name: &str) -> Option<&'static DemoEntry> {
    DEMOS.iter().find(|entry| entry.answers_to(name))
}

/// Registered names in listing order
pub fn names() -> impl Iterator<Item = &'static str> {
    DEMOS.iter().map(DemoEntry::name)
}

/// Print the available names
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn list(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Available functions:")?;
    for name in names() {
        writeln!(out, "  - {name}")?;
    }
    Ok(())
}

/// Run the example called `name`, or list the examples
///
/// An empty name counts as no name. An unknown name is not an error: it
/// is reported on the sink followed by the listing.
///
/// # Errors
///
/// Returns error if the output sink cannot be written or the routine
/// itself fails (the defensive-check example does so on purpose)
pub fn dispatch(name: Option<&str>, ctx: &mut DemoContext<'_>) -> Result<Dispatch> {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        list(ctx.out())?;
        return Ok(Dispatch::Listed);
    };

    match lookup(name) {
        Some(entry) => {
            info!(example = entry.name(), "running example");
            entry.run(ctx)?;
            debug!(example = entry.name(), "example finished");
            Ok(Dispatch::Ran(entry.name()))
        }
        None => {
            info!(example = name, "unknown example requested");
            let out = ctx.out();
            writeln!(out, "Function not found: {name}")?;
            writeln!(out)?;
            list(out)?;
            Ok(Dispatch::NotFound)
        }
    }
}
