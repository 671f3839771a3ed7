// movievec/src/schema.rs
// Collection schema builder: property list, vectorization strategy, and
// generative module, rendered to the store's JSON class definition.

use serde_json::{Map, Value, json};

/// Store-side property types used by the movie collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Number,
    Int,
    IntArray,
    Date,
    Blob,
}

impl DataType {
    pub fn as_store_type(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Int => "int",
            DataType::IntArray => "int[]",
            DataType::Date => "date",
            DataType::Blob => "blob",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name:      String,
    pub data_type: DataType,
}

impl Property {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Property {
            name: name.to_string(),
            data_type,
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "dataType": [self.data_type.as_store_type()],
        })
    }
}

/// A property contributing to a multimodal vector, with its blend weight.
#[derive(Debug, Clone)]
pub struct WeightedField {
    pub name:   String,
    pub weight: f64,
}

impl WeightedField {
    pub fn new(name: &str, weight: f64) -> Self {
        WeightedField {
            name: name.to_string(),
            weight,
        }
    }
}

/// How the store derives a vector for each object.
#[derive(Debug, Clone)]
pub enum Vectorizer {
    /// No service-side vectorization; the caller supplies every vector.
    SelfProvided,
    /// Automatic single text vector.
    Text2VecOpenAi,
    /// Weighted multimodal blend of image and text properties.
    Multi2VecClip {
        image_fields: Vec<WeightedField>,
        text_fields:  Vec<WeightedField>,
    },
}

impl Vectorizer {
    fn module_name(&self) -> &'static str {
        match self {
            Vectorizer::SelfProvided => "none",
            Vectorizer::Text2VecOpenAi => "text2vec-openai",
            Vectorizer::Multi2VecClip { .. } => "multi2vec-clip",
        }
    }

    fn module_config(&self, source_properties: Option<&[String]>) -> Option<Value> {
        match self {
            Vectorizer::SelfProvided => None,
            Vectorizer::Text2VecOpenAi => {
                let mut config = Map::new();
                if let Some(props) = source_properties {
                    config.insert("properties".to_string(), json!(props));
                }
                Some(Value::Object(config))
            },
            Vectorizer::Multi2VecClip {
                image_fields,
                text_fields,
            } => Some(json!({
                "imageFields": image_fields.iter().map(|f| &f.name).collect::<Vec<_>>(),
                "textFields": text_fields.iter().map(|f| &f.name).collect::<Vec<_>>(),
                "weights": {
                    "imageFields": image_fields.iter().map(|f| f.weight).collect::<Vec<_>>(),
                    "textFields": text_fields.iter().map(|f| f.weight).collect::<Vec<_>>(),
                },
            })),
        }
    }
}

/// One of several independently computed vectors on the same object,
/// selectable at query time by name.
#[derive(Debug, Clone)]
pub struct NamedVector {
    pub name:              String,
    pub vectorizer:        Vectorizer,
    pub source_properties: Vec<String>,
}

impl NamedVector {
    pub fn new(name: &str, vectorizer: Vectorizer, source_properties: &[&str]) -> Self {
        NamedVector {
            name: name.to_string(),
            vectorizer,
            source_properties: source_properties.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VectorConfig {
    Single(Vectorizer),
    Named(Vec<NamedVector>),
}

/// Generative module wired into the collection for RAG queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generative {
    OpenAi,
    Cohere,
}

impl Generative {
    fn module_name(&self) -> &'static str {
        match self {
            Generative::OpenAi => "generative-openai",
            Generative::Cohere => "generative-cohere",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub name:          String,
    pub properties:    Vec<Property>,
    pub vector_config: VectorConfig,
    pub generative:    Option<Generative>,
}

impl CollectionSchema {
    pub fn new(name: &str, properties: Vec<Property>, vectorizer: Vectorizer) -> Self {
        CollectionSchema {
            name: name.to_string(),
            properties,
            vector_config: VectorConfig::Single(vectorizer),
            generative: None,
        }
    }

    pub fn with_named_vectors(name: &str, properties: Vec<Property>, vectors: Vec<NamedVector>) -> Self {
        CollectionSchema {
            name: name.to_string(),
            properties,
            vector_config: VectorConfig::Named(vectors),
            generative: None,
        }
    }

    pub fn with_generative(mut self, generative: Generative) -> Self {
        self.generative = Some(generative);
        self
    }

    /// Renders the store's JSON class definition.
    pub fn to_value(&self) -> Value {
        let mut class = Map::new();
        class.insert("class".to_string(), json!(self.name));
        class.insert(
            "properties".to_string(),
            Value::Array(self.properties.iter().map(|p| p.to_value()).collect()),
        );

        let mut module_config = Map::new();
        match &self.vector_config {
            VectorConfig::Single(vectorizer) => {
                class.insert("vectorizer".to_string(), json!(vectorizer.module_name()));
                if let Some(config) = vectorizer.module_config(None) {
                    module_config.insert(vectorizer.module_name().to_string(), config);
                }
            },
            VectorConfig::Named(vectors) => {
                let mut vector_config = Map::new();
                for nv in vectors {
                    let inner = nv
                        .vectorizer
                        .module_config(Some(&nv.source_properties))
                        .unwrap_or_else(|| json!({}));
                    vector_config.insert(
                        nv.name.clone(),
                        json!({
                            "vectorizer": { nv.vectorizer.module_name(): inner },
                            "vectorIndexType": "hnsw",
                        }),
                    );
                }
                class.insert("vectorConfig".to_string(), Value::Object(vector_config));
            },
        }

        if let Some(generative) = self.generative {
            module_config.insert(generative.module_name().to_string(), json!({}));
        }
        if !module_config.is_empty() {
            class.insert("moduleConfig".to_string(), Value::Object(module_config));
        }

        Value::Object(class)
    }
}

/// The six base movie properties shared by every collection variant; the
/// multimodal variants add a `poster` blob.
pub fn movie_properties(with_poster: bool) -> Vec<Property> {
    let mut properties = vec![
        Property::new("title", DataType::Text),
        Property::new("overview", DataType::Text),
        Property::new("vote_average", DataType::Number),
        Property::new("genre_ids", DataType::IntArray),
        Property::new("release_date", DataType::Date),
        Property::new("tmdb_id", DataType::Int),
    ];
    if with_poster {
        properties.push(Property::new("poster", DataType::Blob));
    }
    properties
}
