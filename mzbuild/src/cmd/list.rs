use crate::cmd::CommonArgs;
use anyhow::Result;
use clap::Parser;
use mzbuild_core::Repository;
use std::process::ExitCode;

#[derive(Debug, Parser)]
pub(crate) struct List {
    #[clap(flatten)]
    common: CommonArgs,
}

impl List {
    pub(crate) fn run(&self) -> Result<ExitCode> {
        let repo = Repository::discover(self.common.root.as_path())?;
        let mut names: Vec<&String> = repo.images.keys().collect();
        names.sort();
        for name in names {
            let image = repo.image(name).expect("name came from the same map");
            println!("{}\t{}", name, if image.publish { "publish" } else { "local" });
        }
        Ok(ExitCode::SUCCESS)
    }
}
