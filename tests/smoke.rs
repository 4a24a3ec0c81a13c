use assert_cmd::Command;

#[test]
fn cli_help_runs() {
    let mut cmd = Command::cargo_bin("article-digest").expect("binary exists");
    cmd.arg("--help").assert().success();
}

#[test]
fn join_command_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let terms = dir.path().join("topic-terms.csv");
    let docs = dir.path().join("doc-topics.csv");
    let out = dir.path().join("joined.csv");
    std::fs::write(&terms, "topic,term,weight\n1,cell,0.5\n1,gene,0.9\n").unwrap();
    std::fs::write(&docs, "docname,topic,proportion\na.txt,1,0.8\n").unwrap();

    let mut cmd = Command::cargo_bin("article-digest").expect("binary exists");
    cmd.current_dir(dir.path())
        .env("DATA_DIR", dir.path().join("data"))
        .env("OUTPUTS_DIR", dir.path().join("outputs"))
        .arg("join")
        .arg("--topic-terms")
        .arg(&terms)
        .arg("--doc-topics")
        .arg(&docs)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("docname,topic,proportion,terms"));
    assert!(written.contains("gene, cell"));
}
