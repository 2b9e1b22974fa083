use std::path::Path;

use duckdb::Connection;
use tempfile::TempDir;

/// Write one CSV sink the way the harvester does: header row, every
/// field quoted.
fn write_sink(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

/// Populate a data directory with all seven sinks.
fn create_test_sinks(data_dir: &Path) {
    write_sink(
        data_dir,
        "movies.csv",
        "\"adult\",\"backdrop_path\",\"genre_ids\",\"id\",\"original_language\",\"original_title\",\"overview\",\"popularity\",\"poster_path\",\"release_date\",\"title\",\"video\",\"vote_average\",\"vote_count\"\n\
         \"false\",\"/x1.jpg\",\"[18]\",\"550\",\"en\",\"Fight Club\",\"An insomniac...\",\"61.4\",\"/p1.jpg\",\"1999-10-15\",\"Fight Club\",\"false\",\"8.4\",\"26280\"\n\
         \"false\",\"\",\"[28,878]\",\"603\",\"en\",\"The Matrix\",\"A hacker...\",\"72.1\",\"/p2.jpg\",\"1999-03-30\",\"The Matrix\",\"false\",\"8.2\",\"24000\"\n",
    );
    write_sink(
        data_dir,
        "movie_details.csv",
        "\"movie_id\",\"payload_json\",\"ingested_at\"\n\
         \"550\",\"{\"\"id\"\": 550, \"\"runtime\"\": 139}\",\"2024-05-01T12:00:00+00:00\"\n",
    );
    write_sink(
        data_dir,
        "credits.csv",
        "\"movie_id\",\"cast\",\"crew\",\"ingested_at\"\n\
         \"550\",\"[{\"\"id\"\": 819, \"\"order\"\": 0}]\",\"[]\",\"2024-05-01T12:00:00+00:00\"\n",
    );
    write_sink(
        data_dir,
        "people.csv",
        "\"adult\",\"also_known_as\",\"biography\",\"birthday\",\"deathday\",\"gender\",\"homepage\",\"id\",\"imdb_id\",\"known_for_department\",\"name\",\"place_of_birth\",\"popularity\",\"profile_path\"\n\
         \"false\",\"[]\",\"Actor.\",\"1969-08-18\",\"\",\"2\",\"\",\"819\",\"nm0001570\",\"Acting\",\"Edward Norton\",\"Boston\",\"26.9\",\"/e2.jpg\"\n",
    );
    write_sink(
        data_dir,
        "genres.csv",
        "\"id\",\"name\"\n\"28\",\"Action\"\n\"18\",\"Drama\"\n\"878\",\"Science Fiction\"\n",
    );
    write_sink(
        data_dir,
        "countries.csv",
        "\"iso_3166_1\",\"english_name\",\"native_name\"\n\"US\",\"United States of America\",\"United States\"\n\"FR\",\"France\",\"France\"\n",
    );
    write_sink(
        data_dir,
        "languages.csv",
        "\"iso_639_1\",\"english_name\",\"name\"\n\"en\",\"English\",\"English\"\n",
    );
}

#[test]
fn test_load_pipeline() {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    create_test_sinks(&data_dir);

    let database = tmp.path().join("warehouse").join("cineline.duckdb");
    let config = cineline_load::LoadConfig {
        data_dir: data_dir.clone(),
        database: database.clone(),
        memory_limit: "256MB".to_string(),
        threads: 2,
    };

    let summary = cineline_load::run(&config).unwrap();

    let counts: Vec<(&str, u64)> = summary
        .tables
        .iter()
        .map(|(t, n)| (t.as_str(), *n))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("movies", 2),
            ("movie_details", 1),
            ("credits", 1),
            ("people", 1),
            ("genres", 3),
            ("countries", 2),
            ("languages", 1),
        ]
    );
    assert_eq!(summary.total_rows(), 11);
    assert!(database.exists());

    // The warehouse is queryable after the connection is gone
    let conn = Connection::open(&database).unwrap();
    let title: String = conn
        .query_row(
            "SELECT title FROM raw.movies WHERE id = 550",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(title, "Fight Club");

    let name: String = conn
        .query_row("SELECT name FROM raw.people WHERE id = 819", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "Edward Norton");
}

/// A missing sink must name the harvest stage that produces it.
#[test]
fn test_missing_sink_names_the_stage() {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    create_test_sinks(&data_dir);
    std::fs::remove_file(data_dir.join("people.csv")).unwrap();

    let result = cineline_load::run(&cineline_load::LoadConfig {
        data_dir,
        database: tmp.path().join("cineline.duckdb"),
        memory_limit: "256MB".to_string(),
        threads: 2,
    });

    let err = format!("{:#}", result.unwrap_err());
    assert!(
        err.contains("cineline harvest people"),
        "error should point at the people stage, got: {err}"
    );
}

/// Rerunning the load replaces each table instead of appending to it.
#[test]
fn test_rerun_is_a_full_refresh() {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    create_test_sinks(&data_dir);

    let config = cineline_load::LoadConfig {
        data_dir: data_dir.clone(),
        database: tmp.path().join("cineline.duckdb"),
        memory_limit: "256MB".to_string(),
        threads: 2,
    };
    cineline_load::run(&config).unwrap();

    // Shrink the catalog, then reload
    write_sink(
        &data_dir,
        "movies.csv",
        "\"adult\",\"backdrop_path\",\"genre_ids\",\"id\",\"original_language\",\"original_title\",\"overview\",\"popularity\",\"poster_path\",\"release_date\",\"title\",\"video\",\"vote_average\",\"vote_count\"\n\
         \"false\",\"\",\"[18]\",\"550\",\"en\",\"Fight Club\",\"...\",\"61.4\",\"\",\"1999-10-15\",\"Fight Club\",\"false\",\"8.4\",\"26280\"\n",
    );
    let summary = cineline_load::run(&config).unwrap();

    let movies = summary
        .tables
        .iter()
        .find(|(t, _)| t == "movies")
        .map(|(_, n)| *n);
    assert_eq!(movies, Some(1), "reload must replace, not append");
}
