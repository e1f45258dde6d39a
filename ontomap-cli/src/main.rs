use clap::{App, Arg, ArgMatches};
use ontomap::{LookupDb, OntologyTable, Oracle, TableConfig};

fn app<'a, 'b>() -> clap::App<'a, 'b> {
    App::new("ontomap")
        .arg(Arg::with_name("features")
            .long("--features")
            .help("Tab-delimited feature table to mine")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("organism")
            .long("--organism")
            .help("Organism name used when searching for supplementary records")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("db")
            .long("--db")
            .possible_values(&["uniprot", "ncbi"])
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("label_col")
            .long("--label-col")
            .help("Feature table column holding the feature identifier")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("accession_col")
            .long("--accession-col")
            .help("Feature table column holding the protein accession")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("description_col")
            .long("--description-col")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("gene_col")
            .long("--gene-col")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("output")
            .long("--output")
            .short("o")
            .required(true)
            .takes_value(true))
}

fn main() {
    tracing_subscriber::fmt::init();
    let matches = app().get_matches();

    match run(&matches) {
        Ok(()) => (),
        Err(e) => eprintln!("{}", e),
    }
}

fn run(args: &ArgMatches) -> Result<(), String> {
    let features = args.value_of("features").expect("should have features arg");
    let organism = args.value_of("organism").expect("should have organism arg");
    let db = args.value_of("db").expect("should have db arg");
    let label_col = args.value_of("label_col").expect("should have label-col arg");
    let accession_col = args.value_of("accession_col").expect("should have accession-col arg");
    let description_col = args.value_of("description_col").expect("should have description-col arg");
    let gene_col = args.value_of("gene_col").expect("should have gene-col arg");
    let out_path = args.value_of("output").expect("should have output arg");

    let lookup_db = match db {
        "uniprot" => LookupDb::Uniprot,
        "ncbi" => LookupDb::Ncbi,
        _ => unreachable!(),
    };

    let config = TableConfig {
        organism: organism.to_string(),
        feature_table: features.into(),
        lookup_db,
        label_col: label_col.to_string(),
        accession_col: accession_col.to_string(),
        description_col: description_col.to_string(),
        gene_col: gene_col.to_string(),
    };

    let oracle = Oracle::with_http();
    let mut table = OntologyTable::build(&config, &oracle)
        .map_err(|e| format!("failed to build annotation table: {}", e))?;

    table.dump(out_path, &oracle.ontology)
        .map_err(|e| format!("failed to write annotation table: {}", e))?;

    Ok(())
}
