mod common;

use std::sync::Arc;

use common::{id_of, Fixture, PEOPLE_CSV, PLACES_CSV};
use indexmap::IndexMap;
use serde_json::json;
use serene::{ClientConfig, DataSet, Entity, EntityKind, InMemoryTransport, Octopus, Ontology, SereneError, Ssd};

#[test]
fn test_repeated_get_returns_same_object() {
    let fx = Fixture::new();
    let dataset = fx.upload_dataset("people.csv", PEOPLE_CSV);
    let id = id_of(dataset.id());
    fx.server.reset_calls();

    let a = fx.serene.datasets().get(id).unwrap();
    let b = fx.serene.datasets().get(id).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &dataset));
    assert_eq!(fx.server.calls("item", EntityKind::DataSet), 0);

    let items = fx.serene.datasets().items().unwrap();
    assert_eq!(items.len(), 1);
    assert!(Arc::ptr_eq(&items[0], &a));
}

#[test]
fn test_get_unknown_key_is_not_found() {
    let fx = Fixture::new();
    let err = fx.serene.datasets().get(404).unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, SereneError::NotFound { kind: "DataSet", key: 404 }));
}

#[test]
fn test_upload_invalidates_cache() {
    let fx = Fixture::new();
    let people = fx.upload_dataset("people.csv", PEOPLE_CSV);
    let before = fx.serene.datasets().items().unwrap();
    assert_eq!(before.len(), 1);

    let places = fx.upload_dataset("places.csv", PLACES_CSV);
    let after = fx.serene.datasets().items().unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[1].id(), places.id());

    let again = fx.serene.datasets().get(id_of(people.id())).unwrap();
    assert!(!Arc::ptr_eq(&again, &people));
}

#[test]
fn test_failed_mutation_still_invalidates() {
    let fx = Fixture::new();
    let dataset = fx.upload_dataset("people.csv", PEOPLE_CSV);
    let id = id_of(dataset.id());
    assert_eq!(fx.serene.datasets().items().unwrap().len(), 1);

    fx.server.fail_next_mutation();
    let err = fx.serene.datasets().remove(id).unwrap_err();
    assert!(matches!(err, SereneError::Server { status: 503, .. }));

    // the server applied the delete before failing
    assert!(fx.serene.datasets().items().unwrap().is_empty());
    assert!(fx.serene.datasets().get(id).unwrap_err().is_not_found());
}

#[test]
fn test_dataset_upload_parses_columns() {
    let fx = Fixture::new();
    let path = fx.write("people.csv", PEOPLE_CSV);
    let mut types = IndexMap::new();
    types.insert("name".to_string(), "string".to_string());

    let dataset = fx.serene.datasets().upload(&path, "people", &types).unwrap();
    assert!(dataset.stored());
    assert_eq!(dataset.description(), "people");
    assert_eq!(dataset.filename(), "people.csv");
    assert_eq!(dataset.type_map().get("name").map(String::as_str), Some("string"));
    let names: Vec<&str> = dataset.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["name", "city"]);
    assert_eq!(dataset.column("city").unwrap().sample, vec!["Oslo", "Rome", "Lima"]);
}

#[test]
fn test_dataset_upload_missing_file() {
    let fx = Fixture::new();
    let err = fx
        .serene
        .datasets()
        .upload(fx.dir.path().join("nope.csv"), "", &IndexMap::new())
        .unwrap_err();
    assert!(matches!(err, SereneError::Validation(_)));
    assert_eq!(fx.server.total_calls(), 0);
}

#[test]
fn test_columns_index_follows_datasets() {
    let fx = Fixture::new();
    let people = fx.upload_dataset("people.csv", PEOPLE_CSV);
    assert_eq!(fx.serene.datasets().columns().unwrap().len(), 2);

    fx.upload_dataset("places.csv", PLACES_CSV);
    let columns = fx.serene.datasets().columns().unwrap();
    assert_eq!(columns.len(), 4);

    let city = people.column("city").unwrap();
    assert_eq!(columns.get(city.id).unwrap().dataset_id, id_of(people.id()));
}

#[test]
fn test_remove_by_id_and_by_value() {
    let fx = Fixture::new();
    let first = fx.upload_ontology("first.owl");
    let second = fx.upload_ontology("second.owl");

    fx.serene.ontologies().remove(&first).unwrap();
    fx.serene.ontologies().remove(id_of(second.id())).unwrap();
    assert!(fx.serene.ontologies().items().unwrap().is_empty());
}

#[test]
fn test_remove_local_entity_is_rejected() {
    let fx = Fixture::new();
    let local = Ontology::new(fx.dir.path().join("draft.owl"));

    let err = fx.serene.ontologies().remove(&local).unwrap_err();
    assert!(matches!(err, SereneError::Validation(_)));
    assert_eq!(fx.server.calls("delete", EntityKind::Ontology), 0);
}

#[test]
fn test_ontology_upload_in_place_and_update() {
    let fx = Fixture::new();
    let path = fx.write("music.ttl", "@prefix ex: <http://ex.org/> .\n");
    let mut ontology = Ontology::new(&path);

    let stored = fx.serene.ontologies().upload(&mut ontology, "music", None).unwrap();
    assert!(ontology.stored());
    assert_eq!(stored.id(), ontology.id());
    assert_eq!(ontology.name(), "music.ttl");
    assert_eq!(ontology.format().as_str(), "ttl");

    fx.serene
        .ontologies()
        .update(&mut ontology, None, Some("music, revised"), None)
        .unwrap();
    assert_eq!(ontology.description(), "music, revised");
    assert_eq!(ontology.file(), Some(path.as_path()));

    let fetched = fx.serene.ontologies().get(id_of(ontology.id())).unwrap();
    assert_eq!(fetched.description(), "music, revised");
}

#[test]
fn test_ontology_update_rejects_missing_file_untouched() {
    let fx = Fixture::new();
    let path = fx.write("music.ttl", "@prefix ex: <http://ex.org/> .\n");
    let mut ontology = Ontology::new(&path);
    fx.serene.ontologies().upload(&mut ontology, "music", None).unwrap();
    let before = ontology.clone();

    let missing = fx.dir.path().join("gone.owl");
    let err = fx
        .serene
        .ontologies()
        .update(&mut ontology, Some(missing.as_path()), None, None)
        .unwrap_err();
    assert!(matches!(err, SereneError::Validation(_)));
    assert_eq!(ontology.file(), Some(path.as_path()));
    assert_eq!(ontology.format().as_str(), "ttl");
    assert_eq!(ontology.id(), before.id());
    assert!(ontology.stored());

    let replacement = fx.write("music.owl", "<rdf:RDF/>\n");
    fx.server.fail_next_mutation();
    assert!(fx
        .serene
        .ontologies()
        .update(&mut ontology, Some(replacement.as_path()), None, None)
        .is_err());
    assert_eq!(ontology.file(), Some(path.as_path()));

    fx.serene
        .ontologies()
        .update(&mut ontology, Some(replacement.as_path()), None, None)
        .unwrap();
    assert_eq!(ontology.file(), Some(replacement.as_path()));
    assert_eq!(ontology.format().as_str(), "owl");
}

#[test]
fn test_ssd_upload_and_hydration() {
    let fx = Fixture::new();
    let dataset = fx.upload_dataset("people.csv", PEOPLE_CSV);
    let ontology = fx.upload_ontology("people.owl");
    let ssd = fx.upload_ssd(&dataset, &ontology);

    assert!(ssd.stored());
    assert_eq!(ssd.name(), "people.csv");
    assert!(Arc::ptr_eq(ssd.dataset(), &fx.serene.datasets().get(id_of(dataset.id())).unwrap()));
    assert_eq!(ssd.ontologies()[0].id(), ontology.id());
    assert_eq!(ssd.mappings().len(), 2);
    assert_eq!(ssd.semantic_model().class_nodes().count(), 2);
}

#[test]
fn test_ssd_upload_requires_stored_dataset() {
    let fx = Fixture::new();
    let mut ssd = Ssd::new(Arc::new(DataSet::new()), vec![]);

    let err = fx.serene.ssds().upload(&mut ssd).unwrap_err();
    assert!(matches!(err, SereneError::Validation(_)));
    assert_eq!(fx.server.calls("post", EntityKind::Ssd), 0);
}

#[test]
fn test_removing_dataset_cascades_to_dependents() {
    let fx = Fixture::new();
    let (_, octopus) = fx.stored_octopus();
    let spare = fx.upload_dataset("places.csv", PLACES_CSV);

    let ssd = fx.serene.ssds().items().unwrap()[0].clone();
    let octo = fx.serene.octopii().get(id_of(octopus.id())).unwrap();
    let model = fx.serene.models().get(octopus.model_id().unwrap()).unwrap();

    fx.serene.datasets().remove(&spare).unwrap();

    let ssd_again = fx.serene.ssds().get(id_of(ssd.id())).unwrap();
    let octo_again = fx.serene.octopii().get(id_of(octopus.id())).unwrap();
    let model_again = fx.serene.models().get(octopus.model_id().unwrap()).unwrap();
    assert!(!Arc::ptr_eq(&ssd, &ssd_again));
    assert!(!Arc::ptr_eq(&octo, &octo_again));
    assert!(Arc::ptr_eq(&model, &model_again));
}

#[test]
fn test_cache_capacity_bounds_entries() {
    let config = ClientConfig {
        cache_capacity: 2,
        ..ClientConfig::default()
    };
    let fx = Fixture::with(InMemoryTransport::new(), config);
    let ids: Vec<i64> = (0..3)
        .map(|i| fx.server.insert(EntityKind::Ontology, json!({"name": format!("o{}.owl", i)})))
        .collect();

    for id in &ids {
        fx.serene.ontologies().get(*id).unwrap();
    }
    fx.server.reset_calls();

    fx.serene.ontologies().get(ids[2]).unwrap();
    assert_eq!(fx.server.calls("item", EntityKind::Ontology), 0);
    fx.serene.ontologies().get(ids[0]).unwrap();
    assert_eq!(fx.server.calls("item", EntityKind::Ontology), 1);
}

#[test]
fn test_octopus_upload_names_unstored_dependency() {
    let fx = Fixture::new();
    let local = Arc::new(Ontology::new(fx.dir.path().join("draft.owl")));
    let mut octopus = Octopus::builder().name("draft").ontology(local).build().unwrap();

    let err = fx.serene.octopii().upload(&mut octopus).unwrap_err();
    assert!(matches!(err, SereneError::Validation(_)));
    assert!(err.to_string().contains("draft.owl"));
    assert_eq!(fx.server.calls("post", EntityKind::Octopus), 0);
}
