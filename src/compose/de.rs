use std::fmt;
use std::io::Read;

use serde::de;
use serde::de::Deserializer;
use serde::de::MapAccess;
use serde::de::Unexpected;
use serde::de::Visitor;
use serde::Deserialize;

use super::FrameGeometry;
use super::FILTER_NAMES;
use crate::error::FrameResult;


const FIELDS: &'static [&'static str] = &["height_ratio", "width_ratio", "offset_ratio", "filter"];

fn positive_ratio<E: de::Error>(value: f64) -> Result<f64, E> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(E::invalid_value(Unexpected::Float(value), &"a positive ratio"))
    }
}

impl<'de> Deserialize<'de> for FrameGeometry {

    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct InnerVisitor;

        impl<'de> Visitor<'de> for InnerVisitor {
            type Value = FrameGeometry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("struct FrameGeometry")
            }

            fn visit_map<V>(self, mut map: V) -> Result<Self::Value, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut res = FrameGeometry::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "height_ratio" => {
                            res.set_height_ratio(positive_ratio::<V::Error>(map.next_value()?)?)
                        },
                        "width_ratio" => {
                            res.set_width_ratio(positive_ratio::<V::Error>(map.next_value()?)?)
                        },
                        "offset_ratio" => {
                            let value: f64 = map.next_value()?;
                            if !(value.is_finite() && value >= 0.0) {
                                return Err(de::Error::invalid_value(Unexpected::Float(value), &"a non-negative ratio"));
                            }
                            res.set_offset_ratio(value)
                        },
                        "filter" => {
                            let name: String = map.next_value()?;
                            if !res.set_filter(name.as_str()) {
                                return Err(de::Error::unknown_variant(name.as_str(), FILTER_NAMES));
                            }
                        },
                        _ => {
                            return Err(de::Error::unknown_field(key.as_str(), FIELDS));
                        }
                    }
                }
                Ok(res)
            }
        }

        deserializer.deserialize_struct("FrameGeometry", FIELDS, InnerVisitor)
    }
}

pub fn load_geometry<R: Read>(reader: R) -> FrameResult<FrameGeometry> {
    Ok(serde_json::from_reader(reader)?)
}
