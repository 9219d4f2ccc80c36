use include_dir::{include_dir, Dir};

static PASSAGE_DIR: Dir = include_dir!("src/passages");

/// Sample passages shipped with the binary, as (name, text) pairs. The
/// name is the file stem; contents are used verbatim.
pub fn seed_passages() -> Vec<(String, String)> {
    let mut passages: Vec<(String, String)> = PASSAGE_DIR
        .files()
        .filter_map(|file| {
            let name = file.path().file_stem()?.to_str()?.to_string();
            let text = file.contents_utf8()?.to_string();
            Some((name, text))
        })
        .collect();
    passages.sort();
    passages
}
