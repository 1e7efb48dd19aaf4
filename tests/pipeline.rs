use mzinfer::prelude::*;
use mzinfer::{
    AccessionRecord, CombinationMethod, DecoyStrategy, EvidenceGraph, FileId, Filter,
    FilterComparator, GraphBuilder, InferenceEngine, ProteinReport, PsmRecord, PsmReport,
};

fn psm(spectrum: &str, sequence: &str, accessions: &[&str], score: (&str, f64)) -> PsmRecord {
    let mut record = PsmRecord::new(spectrum, sequence).with_score(score.0, score.1);
    for accession in accessions {
        record = record.with_accession(AccessionRecord::new(*accession));
    }
    record
}

fn infer(graph: &EvidenceGraph, strategy: &str) -> Vec<mzinfer::ReportProtein> {
    let psms = PsmReport::new(graph);
    let mut engine = InferenceEngine::from_names(strategy, "additive", psms.scores()).unwrap();
    engine
        .set_scoring_setting("used_score", "mascot_score")
        .unwrap();
    engine.infer(graph, &psms).unwrap()
}

#[test_log::test]
fn shared_peptide_across_files_reports_both() {
    let mut builder = GraphBuilder::new();
    builder.add_file(
        "mascot",
        "first.mzid",
        vec![
            psm("s1", "PEPONEK", &["ACC1"], ("mascot_score", 40.0)),
            psm("s2", "PEPTWOK", &["ACC1", "ACC2"], ("mascot_score", 35.0)),
        ],
    );
    builder.add_file(
        "mascot",
        "second.mzid",
        vec![
            psm("s3", "PEPTHREEK", &["ACC2"], ("mascot_score", 30.0)),
            psm("s2", "PEPTWOK", &["ACC2"], ("mascot_score", 33.0)),
        ],
    );
    let graph = builder.build_intermediate_structure().unwrap();
    assert_eq!(graph.groups().len(), 1);
    let acc1 = graph.accession_by_name("ACC1").unwrap();
    let acc2 = graph.accession_by_name("ACC2").unwrap();
    assert_eq!(acc1.group(), acc2.group());

    let proteins = infer(&graph, "spectrum_extractor");
    let accessions: Vec<&str> = proteins.iter().map(|p| p.accession()).collect();
    assert_eq!(accessions, vec!["ACC1", "ACC2"]);
    assert!(proteins.iter().all(|p| p.sub_sets.is_empty()));
    assert_eq!(proteins[0].nr_group_unique_peptides, 1);
    assert_eq!(proteins[0].nr_spectra(), 2);
    assert_eq!(proteins[0].nr_psms(), 2);
}

#[test_log::test]
fn strict_subset_goes_to_sub_sets() {
    let mut builder = GraphBuilder::new();
    builder.add_file(
        "mascot",
        "first.mzid",
        vec![
            psm("s1", "PEPONEK", &["ACC1"], ("mascot_score", 40.0)),
            psm("s2", "PEPTWOK", &["ACC1", "ACC2"], ("mascot_score", 35.0)),
            psm("s3", "PEPTWOK", &["ACC1", "ACC2"], ("mascot_score", 20.0)),
        ],
    );
    let graph = builder.build_intermediate_structure().unwrap();

    for strategy in ["spectrum_extractor", "occams_razor"] {
        let proteins = infer(&graph, strategy);
        assert_eq!(proteins.len(), 1);
        let acc1 = &proteins[0];
        assert_eq!(acc1.accession(), "ACC1");
        assert_eq!(acc1.sub_sets.len(), 1);
        let acc2 = &acc1.sub_sets[0];
        assert_eq!(acc2.accession(), "ACC2");
        assert!(acc2.spectra().is_subset(&acc1.spectra()));
        assert_eq!(acc2.score, Some(35.0));
        assert_eq!(acc1.score, Some(75.0));
    }

    let proteins = infer(&graph, "report_all");
    assert_eq!(proteins.len(), 2);
}

#[test_log::test]
fn spectrum_covered_by_other_peptide_is_kept_as_sub_set() {
    let mut builder = GraphBuilder::new();
    builder.add_file(
        "mascot",
        "first.mzid",
        vec![
            psm("s1", "AAAK", &["A", "B"], ("mascot_score", 40.0)),
            psm("s2", "CCCK", &["A"], ("mascot_score", 35.0)),
            psm("s2", "DDDK", &["B"], ("mascot_score", 12.0)).with_rank(2),
        ],
    );
    let graph = builder.build_intermediate_structure().unwrap();

    let proteins = infer(&graph, "spectrum_extractor");
    assert_eq!(proteins.len(), 1);
    assert_eq!(proteins[0].accession(), "A");
    assert_eq!(proteins[0].sub_sets.len(), 1);
    let b = &proteins[0].sub_sets[0];
    assert_eq!(b.accession(), "B");
    assert_eq!(b.score, Some(52.0));

    let proteins = infer(&graph, "occams_razor");
    let accessions: Vec<&str> = proteins.iter().map(|p| p.accession()).collect();
    assert_eq!(accessions, vec!["A", "B"]);
}

#[test_log::test]
fn identical_evidence_is_merged() {
    let mut builder = GraphBuilder::new();
    builder.add_file(
        "mascot",
        "first.mzid",
        vec![
            psm("s1", "PEPONEK", &["ZZZ", "AAA"], ("mascot_score", 40.0)),
            psm("s2", "PEPTWOK", &["AAA", "ZZZ"], ("mascot_score", 35.0)),
        ],
    );
    let graph = builder.build_intermediate_structure().unwrap();
    let proteins = infer(&graph, "spectrum_extractor");
    assert_eq!(proteins.len(), 1);
    assert_eq!(proteins[0].accessions, vec!["AAA".to_string(), "ZZZ".to_string()]);
    assert_eq!(proteins[0].accession(), "AAA");
}

fn decoy_graph() -> EvidenceGraph {
    let mut builder = GraphBuilder::new().with_name("decoys");
    builder.add_file(
        "mascot",
        "mascot.dat",
        vec![
            psm("s1", "AAAAK", &["T1"], ("mascot_score", 90.0)),
            psm("s2", "CCCCK", &["T1"], ("mascot_score", 85.0)),
            psm("s3", "DDDDK", &["T2"], ("mascot_score", 80.0)),
            psm("s4", "EEEEK", &["decoy_D1"], ("mascot_score", 70.0)),
            psm("s5", "FFFFK", &["T3"], ("mascot_score", 60.0)),
            psm("s6", "GGGGK", &["T4"], ("mascot_score", 50.0)),
            psm("s7", "HHHHK", &["decoy_D2"], ("mascot_score", 40.0)),
            psm("s8", "IIIIK", &["T5"], ("mascot_score", 30.0)),
        ],
    );
    builder.add_file(
        "tandem",
        "tandem.xml",
        vec![
            psm("s1", "AAAAK", &["T1"], ("xtandem_expect", 0.001)),
            psm("s2", "CCCCK", &["T1"], ("xtandem_expect", 0.01)),
            psm("s4", "EEEEK", &["decoy_D1"], ("xtandem_expect", 0.02)),
            psm("s3", "DDDDK", &["T2"], ("xtandem_expect", 0.05)),
        ],
    );
    builder.build_intermediate_structure().unwrap()
}

#[test_log::test]
fn psm_fdr_and_combined_fdr_score() {
    let graph = decoy_graph();
    let mut psms = PsmReport::new(&graph);
    let strategy = DecoyStrategy::from_name("accessionpattern", Some("^decoy_")).unwrap();
    for file in [FileId(1), FileId(2)] {
        psms.update_decoy_states(file, &strategy).unwrap();
    }
    let summaries = psms.calculate_all_fdr().unwrap();
    assert_eq!(summaries[&FileId(1)].decoys, 2);
    assert_eq!(summaries[&FileId(2)].targets, 3);

    let mut ranked: Vec<_> = psms.psms(FileId(1)).collect();
    ranked.sort_by_key(|p| p.fdr_rank);
    let first_decoy = ranked.iter().find(|p| p.decoy).unwrap();
    let targets_above = ranked
        .iter()
        .filter(|p| !p.decoy && p.fdr_rank <= first_decoy.fdr_rank)
        .count();
    assert_eq!(first_decoy.fdr, Some(1.0 / targets_above as f64));
    assert!(ranked
        .windows(2)
        .all(|w| w[0].q_value.unwrap() <= w[1].q_value.unwrap()));

    psms.calculate_combined_fdr_score(CombinationMethod::Product);
    let sets = psms.psm_sets(FileId::OVERALL);
    assert_eq!(sets.len(), 8);
    assert!(sets.iter().all(|s| s.combined_fdr_score().is_some()));
    let best_target = sets.iter().find(|s| s.spectrum_id == "s1").unwrap();
    let decoy = sets.iter().find(|s| s.spectrum_id == "s4").unwrap();
    assert!(decoy.decoy);
    assert!(best_target.combined_fdr_score() < decoy.combined_fdr_score());
}

#[test_log::test]
fn protein_fdr_and_filtering() {
    let graph = decoy_graph();
    let mut psms = PsmReport::new(&graph);
    let strategy = DecoyStrategy::accession_pattern("^decoy_").unwrap();
    psms.update_decoy_states(FileId(1), &strategy).unwrap();
    psms.calculate_fdr(FileId(1), "mascot_score").unwrap();

    let mut engine = InferenceEngine::from_names("spectrum_extractor", "additive", psms.scores())
        .unwrap()
        .with_file(FileId(1));
    engine
        .set_scoring_setting("used_score", "mascot_score")
        .unwrap();
    engine
        .add_filter(Filter::new("psm_q_value_filter", FilterComparator::LessEqual, 0.5, false).unwrap())
        .unwrap();

    let mut proteins: ProteinReport = engine.infer_report(&graph, &psms).unwrap();
    assert_eq!(proteins.len(), 7);
    assert!(proteins.score_model().higher_is_better);

    let counts = proteins.update_decoy_states(&strategy);
    assert_eq!(counts.decoys, 2);
    proteins.calculate_fdr();

    let d1 = proteins.find_by_accession("decoy_D1").unwrap();
    assert_eq!(d1.rank, Some(3));
    assert_eq!(d1.fdr, Some(0.5));
    let mut by_rank: Vec<_> = proteins.proteins().iter().collect();
    by_rank.sort_by_key(|p| p.rank);
    assert!(by_rank
        .windows(2)
        .all(|w| w[0].q_value.unwrap() <= w[1].q_value.unwrap()));

    let filters = vec![
        Filter::new(
            "nr_group_unique_peptides_per_protein_filter",
            FilterComparator::GreaterEqual,
            2usize,
            false,
        )
        .unwrap(),
        Filter::new("protein_decoy_filter", FilterComparator::Equal, true, true).unwrap(),
    ];
    let passing: Vec<&str> = proteins.filtered(&filters).map(|p| p.accession()).collect();
    assert_eq!(passing, vec!["T1"]);
}

#[test_log::test]
fn small_copy_reproduces_scores() {
    let graph = decoy_graph();
    let psms = PsmReport::new(&graph);
    let mut engine =
        InferenceEngine::from_names("spectrum_extractor", "multiplicative", psms.scores()).unwrap();
    engine
        .set_scoring_setting("used_score", "xtandem_expect")
        .unwrap();
    engine.set_scoring_setting("used_spectra", "all").unwrap();
    let proteins = engine.infer(&graph, &psms).unwrap();

    let small = engine.scoring().small_copy();
    assert_eq!(small.settings().available_scores().len(), 1);
    for protein in proteins.iter() {
        assert_eq!(small.calculate_protein_score(protein), protein.score);
    }
    let t1 = proteins.iter().find(|p| p.accession() == "T1").unwrap();
    assert!((t1.score.unwrap() - 5.0).abs() < 1e-9);
    let t3 = proteins.iter().find(|p| p.accession() == "T3").unwrap();
    assert_eq!(t3.score, None);
}
