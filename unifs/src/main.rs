use clap::{crate_description, crate_name, crate_version, App, AppSettings, Arg, SubCommand};
use env_logger::Env;
use unifs::{create, extract, list, verify};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let arg_archive = Arg::with_name("archive")
        .help("Image file")
        .required(true)
        .value_name("ARCHIVE");

    let arg_basedir = Arg::with_name("basedir")
        .help("Directory to compare with or unpack to (defaults to '.')")
        .value_name("DIR")
        .default_value(".");

    let matches = App::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("create")
                .about("Pack a directory into an image")
                .arg(
                    Arg::with_name("source")
                        .help("Source directory")
                        .required(true)
                        .value_name("SOURCE"),
                )
                .arg(
                    Arg::with_name("output")
                        .help("Image file to write")
                        .required(true)
                        .value_name("OUTPUT"),
                ),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List image entries")
                .arg(&arg_archive),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("Extract image")
                .arg(&arg_archive)
                .arg(&arg_basedir),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Verify image against a source directory")
                .arg(&arg_archive)
                .arg(&arg_basedir),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("create") {
        create(
            matches.value_of("source").unwrap(),
            matches.value_of("output").unwrap(),
        )?;
    } else if let Some(matches) = matches.subcommand_matches("list") {
        list(matches.value_of("archive").unwrap())?;
    } else if let Some(matches) = matches.subcommand_matches("extract") {
        extract(
            matches.value_of("archive").unwrap(),
            matches.value_of("basedir").unwrap(),
        )?;
    } else if let Some(matches) = matches.subcommand_matches("verify") {
        verify(
            matches.value_of("archive").unwrap(),
            matches.value_of("basedir").unwrap(),
        )?;
    }
    Ok(())
}
