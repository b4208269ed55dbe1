pub mod provenance;
