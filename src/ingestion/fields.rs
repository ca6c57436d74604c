//! Field table for `vehicle_info`
//!
//! Column order matches the destination DDL. Several columns repeat another
//! column's source (`make2`, `mvrregmake`, ...); downstream readers expect all
//! of them, so they are kept as-is.

use crate::db::schema::{ColumnDef, SqlType, TableDef};
use crate::ingestion::mapper::FieldSource;

use FieldSource::{Absent, Chain, Constant, Now, RegistrationDate};
use SqlType::{Boolean, Date, Decimal, Integer, Text, Timestamp, Varchar};

pub const DEFAULT_TABLE: &str = "vehicle_info";

pub const REGISTRATION_YEAR: &str = "firstNzRegistrationYear";
pub const REGISTRATION_MONTH: &str = "firstNzRegistrationMonth";

/// One destination column and how to fill it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub sql_type: SqlType,
    pub source: FieldSource,
}

const fn field(column: &'static str, sql_type: SqlType, source: FieldSource) -> FieldSpec {
    FieldSpec {
        column,
        sql_type,
        source,
    }
}

const STR: SqlType = Varchar(255);

const MAKE: FieldSource = Chain(&["make"]);
const MODEL: FieldSource = Chain(&["model"]);
const SUBMODEL: FieldSource = Chain(&["submodel"]);
const BODY: FieldSource = Chain(&["vehicleType", "bodyType"]);
const YEAR: FieldSource = Chain(&["vehicleYear"]);
const COLOUR: FieldSource = Chain(&["basicColour"]);
const TRANSMISSION: FieldSource = Chain(&["transmissionType"]);
const ORIGIN: FieldSource = Chain(&["originalCountry"]);
const PREVIOUS: FieldSource = Chain(&["previousCountry"]);

pub const VEHICLE_FIELDS: &[FieldSpec] = &[
    field("plate", STR, Chain(&["vin11"])),
    field("year", Integer, YEAR),
    field("make", STR, MAKE),
    field("model", STR, MODEL),
    field("submodel", STR, SUBMODEL),
    field("type", STR, BODY),
    field("odometer", Integer, Absent),
    field("colour", STR, COLOUR),
    field("fuel", STR, Chain(&["motivePower"])),
    field("transmission", STR, TRANSMISSION),
    field("drive", STR, Absent),
    field("firstnzregistration", Date, RegistrationDate),
    field("originalcountry", STR, ORIGIN),
    field("previouscountry", STR, PREVIOUS),
    field("numberofowners", Integer, Absent),
    field("rrpvehicle", Boolean, Absent),
    field("rrp", Decimal(12, 2), Absent),
    field("residualvalue", Decimal(12, 2), Absent),
    field("lowvalue", Decimal(12, 2), Absent),
    field("averagevalue", Decimal(12, 2), Absent),
    field("highvalue", Decimal(12, 2), Absent),
    field("confidence", Decimal(5, 2), Absent),
    field("plate2", STR, Absent),
    field("vin", STR, Absent),
    field("modelcode", STR, Chain(&["industryModelCode", "mvmaModelCode"])),
    field("vehicleid", STR, Chain(&["\u{feff}objectid", "objectid"])),
    field("errorcode", STR, Absent),
    field("explanation", Text, Absent),
    field("labelversion", STR, Absent),
    field("labelid", STR, Absent),
    field("lastregupdate", Timestamp, Absent),
    field("modelcode2", STR, Chain(&["mvmaModelCode", "industryModelCode"])),
    field("variant", STR, Absent),
    field("make2", STR, MAKE),
    field("model2", STR, MODEL),
    field("submodel2", STR, SUBMODEL),
    field("vehicletype", STR, BODY),
    field("seats", Integer, Chain(&["numberOfSeats"])),
    field("doors", Integer, Absent),
    field("labelformat", STR, Absent),
    field("fueltype", STR, Chain(&["motivePower", "alternativeMotivePower"])),
    field("enginesize", Integer, Chain(&["ccRating"])),
    field("enginepower", Integer, Chain(&["powerRating"])),
    field("transmission2", STR, TRANSMISSION),
    field("drive2", STR, Absent),
    field("weight", Integer, Chain(&["vdamWeight", "grossVehicleMass"])),
    field("fuelstars", Integer, Absent),
    field("fuelconsumption", Decimal(8, 2), Chain(&["fcCombined"])),
    field("yearlycost", Decimal(12, 2), Absent),
    field("rucrate", Decimal(8, 2), Absent),
    field("ruc", Boolean, Absent),
    field("co2stars", Integer, Absent),
    field("co2", STR, Chain(&["syntheticGreenhouseGas"])),
    field("yearlyco2", Decimal(8, 2), Absent),
    field("safetystars", Integer, Absent),
    field("driversafetystars", Integer, Absent),
    field("driversafetytest", STR, Absent),
    field("fuelpromobadge", STR, Absent),
    field("safetypromobadge", STR, Absent),
    field("likevehicle", Boolean, Absent),
    field("item", STR, Absent),
    field("chassis", STR, Chain(&["chassis7"])),
    field("mvryear", Integer, YEAR),
    field("mvrfirstnzreg", Date, RegistrationDate),
    field("mvrorigcntry", STR, ORIGIN),
    field("mvrprevcntry", STR, PREVIOUS),
    field("mvrregtype", STR, Chain(&["importStatus"])),
    field("mvrregexpires", Date, Absent),
    field("mvrwofexpires", Date, Absent),
    field("mvrodo", Integer, Absent),
    field("mvrtotowners", Integer, Absent),
    field("mvrcolourbase", STR, COLOUR),
    field("mvrcoloursecondary", STR, Absent),
    field("mvrregmake", STR, MAKE),
    field("mvrregmodel", STR, MODEL),
    field("mvrregsubmodel", STR, SUBMODEL),
    field("submodelspec", STR, Absent),
    field("createddateutc", Timestamp, Now),
    field("lastupdatedutc", Timestamp, Now),
    field("iscached", Boolean, Constant(false)),
];

/// Columns of a field table, in order
pub fn columns(fields: &[FieldSpec]) -> Vec<ColumnDef> {
    fields
        .iter()
        .map(|f| ColumnDef {
            name: f.column,
            sql_type: f.sql_type,
        })
        .collect()
}

/// Destination table for vehicle records under `name`
pub fn vehicle_table(name: &str) -> TableDef {
    TableDef::new(name, columns(VEHICLE_FIELDS))
}
