//! Built-in catalog of shared layout definitions.
//!
//! These are the shapes every layout component builds on: grid styling, page
//! breaks, option sources, table columns, the component base (with fields the
//! hierarchy generator adds after loading) and the layout settings files.

use serde_json::json;

use crate::error::GenError;
use crate::node::{
    arr, boolean, constant, enumeration, import, integer, linked, null, number, obj, pascal_case,
    prop, raw, reference, string, union, SchemaNode,
};
use crate::registry::Registry;
use crate::types::Variant;

/// Debounce applied while typing, in milliseconds.
pub const DEFAULT_DEBOUNCE_TIMEOUT: u64 = 400;

/// Result type of an expression-capable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprVal {
    Boolean,
    String,
    Number,
}

/// A literal of the given type, or an expression evaluating to one.
pub fn expr(val: ExprVal) -> SchemaNode {
    let literal = match val {
        ExprVal::Boolean => boolean(),
        ExprVal::String => string(),
        ExprVal::Number => number(),
    };
    union([literal, reference("Expression")])
}

/// A registry holding every catalog definition.
pub fn common() -> Result<Registry, GenError> {
    let mut registry = Registry::new();
    register_common(&mut registry)?;
    Ok(registry)
}

/// Register the catalog definitions into an existing registry.
///
/// # Errors
///
/// Returns `GenError::DuplicateDefinition` if a catalog name is already taken.
pub fn register_common(registry: &mut Registry) -> Result<(), GenError> {
    registry
        .define("Expression", || {
            arr(union([
                string(),
                number(),
                boolean(),
                null(),
                reference("Expression"),
            ]))
            .title("Expression")
            .description("A function call: the function name followed by its arguments")
            .example(json!(["equals", ["component", "myInput"], "yes"]))
        })?
        .define("ILayoutFile", || {
            obj([
                prop("$schema", string().optional()),
                prop(
                    "data",
                    obj([
                        prop(
                            "layout",
                            arr(linked(
                                import("CompOrGroupExternal", "src/layout/layout.d"),
                                raw().emit_schema(|| json!({ "$ref": "#/definitions/AnyComponent" })),
                            )),
                        ),
                        prop(
                            "hidden",
                            expr(ExprVal::Boolean)
                                .title("Hidden")
                                .description("Expression that will hide the page/form layout if true")
                                .optional_with(false),
                        ),
                    ]),
                ),
            ])
            .title("Altinn layout")
            .description("Schema that describes the layout configuration for Altinn applications.")
        })?
        .define("AnyComponent", || {
            obj([prop("type", string().title("Type").description("The component type"))])
                .extends(reference("ComponentBase"))
                .allow_additional_properties()
        })?
        .define("ILabelSettings", || {
            obj([prop(
                "optionalIndicator",
                boolean()
                    .title("Optional indicator")
                    .description("Show optional indicator on label")
                    .optional(),
            )])
        })?
        .define("IPageBreak", || {
            let page_break = |when: &str| {
                expr(ExprVal::String)
                    .optional_with("auto")
                    .title(format!("Page break {}", when))
                    .description(format!(
                        "PDF only: Value or expression indicating whether a page break should be added {} the component. \
                         Can be either: 'auto' (default), 'always', or 'avoid'.",
                        when
                    ))
                    .example("auto")
                    .example("always")
                    .example("avoid")
            };
            obj([
                prop("breakBefore", page_break("before")),
                prop("breakAfter", page_break("after")),
            ])
            .title("Page break")
            .description("Optionally insert page-break before/after component when rendered in PDF")
        })?
        .define("LayoutStyle", || {
            enumeration(["column", "row", "table"])
                .real_enum(pascal_case)
                .title("Layout")
                .description("Define the layout style for the options")
        })?
        .define("IGridSize", || union([constant("auto"), enumeration(1..=12)]))?
        .define("IGridStyling", || {
            obj(["xs", "sm", "md", "lg", "xl"]
                .into_iter()
                .map(|size| prop(size, reference("IGridSize").optional_with("auto"))))
        })?
        .define("IGrid", || {
            obj([
                prop("labelGrid", reference("IGridStyling").optional()),
                prop("innerGrid", reference("IGridStyling").optional()),
            ])
            .extends(reference("IGridStyling"))
            .title("Grid")
            .description("Settings for the components grid. Used for controlling horizontal alignment")
        })?
        .define("IPanelBase", || {
            obj([
                prop(
                    "variant",
                    enumeration(["info", "warning", "error", "success"])
                        .optional()
                        .title("Panel variant")
                        .description("Change the look of the panel"),
                ),
                prop(
                    "showIcon",
                    boolean()
                        .optional_with(true)
                        .title("Show icon")
                        .description("Show icon in the panel header"),
                ),
            ])
        })?
        .define("IDataModelBindingsSimple", || {
            obj([prop("simpleBinding", string())])
                .title("Data model binding")
                .description(
                    "Describes the location in the data model where the component should store its value(s). \
                     A simple binding is used for components that only store a single value, usually a string.",
                )
        })?
        .define("IDataModelBindingsList", || {
            obj([prop("list", string())])
                .title("Data model binding")
                .description(
                    "Describes the location in the data model where the component should store its value(s). \
                     A list binding should be pointed to an array structure in the data model.",
                )
        })?
        .define("IOption", || {
            obj([
                prop("label", string()),
                prop("value", string()),
                prop("description", string().optional()),
                prop("helpText", string().optional()),
            ])
            .example(json!({ "label": "", "value": "" }))
        })?
        .define("IMapping", || {
            obj([])
                .additional_properties(string())
                .title("Mapping")
                .description(
                    "A mapping of key-value pairs (usually used for mapping a path in the data model to a query string parameter).",
                )
        })?
        .define("IQueryParameters", || {
            obj([])
                .additional_properties(string())
                .title("Query parameters")
                .description("A mapping of query string parameters to values. Will be appended to the URL when fetching options.")
        })?
        .define("IOptionSource", || {
            obj([
                prop(
                    "group",
                    string()
                        .title("Group")
                        .description("The repeating group to base options on.")
                        .example("model.some.group"),
                ),
                prop(
                    "label",
                    expr(ExprVal::String)
                        .title("Label")
                        .description("A label of the option displayed in Radio- and Checkbox groups.")
                        .example("some.text.key"),
                ),
                prop(
                    "value",
                    string()
                        .title("Value")
                        .description("Field in the group that should be used as value")
                        .example("model.some.group[{0}].someField"),
                ),
                prop(
                    "description",
                    expr(ExprVal::String)
                        .optional()
                        .title("Description")
                        .description("A description of the option displayed in Radio- and Checkbox groups.")
                        .example("some.text.key")
                        .example("My Description"),
                ),
            ])
            .title("Option source")
            .description("Allows for fetching options from the data model, pointing to a repeating group structure")
        })?
        .define("ISelectionComponent", || {
            obj([
                prop(
                    "optionsId",
                    string()
                        .optional()
                        .title("Dynamic options (fetched from server)")
                        .description("ID of the option list to fetch from the server"),
                ),
                prop("mapping", reference("IMapping").optional()),
                prop("queryParameters", reference("IQueryParameters").optional()),
                prop(
                    "options",
                    arr(reference("IOption"))
                        .optional()
                        .title("Static options")
                        .description("List of static options"),
                ),
                prop(
                    "secure",
                    boolean()
                        .optional_with(false)
                        .title("Secure options (when using optionsId)")
                        .description("Whether to call the secure API endpoint when fetching options from the server"),
                ),
                prop(
                    "sortOrder",
                    enumeration(["asc", "desc"])
                        .description("Sorts the code list in either ascending or descending order by label.")
                        .optional(),
                ),
                prop("source", reference("IOptionSource").optional()),
            ])
        })?
        .define("ISelectionComponentFull", || {
            obj([prop(
                "preselectedOptionIndex",
                integer()
                    .optional()
                    .title("Preselected option index")
                    .description("Index of the option to preselect (if no option has been selected yet)"),
            )])
            .extends(reference("ISelectionComponent"))
        })?
        .define("ITableColumnsAlignText", || {
            enumeration(["left", "center", "right"])
                .title("Align Text")
                .description("Choose text alignment between 'left', 'center', or 'right' for text in table cells.")
        })?
        .define("ITableColumnsTextOverflow", || {
            obj([
                prop(
                    "lineWrap",
                    boolean()
                        .optional_with(true)
                        .title("Line Wrap")
                        .description("Toggle line wrapping on or off. Defaults to true"),
                ),
                prop(
                    "maxHeight",
                    number()
                        .optional_with(2)
                        .title("Max Height")
                        .description("Determines the number of lines to display in table cell before hiding the rest. Defaults to 2."),
                ),
            ])
        })?
        .define("ITableColumnFormatting", || {
            obj([]).additional_properties(reference("ITableColumnProperties"))
        })?
        .define("ITableColumnProperties", || {
            obj([
                prop(
                    "width",
                    string()
                        .optional_with("auto")
                        .title("Width")
                        .description("Width of cell in % or 'auto'. Defaults to 'auto'")
                        .pattern("^([0-9]{1,2}%|100%|auto)$"),
                ),
                prop("alignText", reference("ITableColumnsAlignText").optional()),
                prop("textOverflow", reference("ITableColumnsTextOverflow").optional()),
            ])
            .title("Column options")
            .description("Options for the row/column")
            .example(json!({
                "width": "auto",
                "alignText": "left",
                "textOverflow": { "lineWrap": true, "maxHeight": 2 }
            }))
        })?
        .define("ComponentBase", || {
            obj([
                prop(
                    "id",
                    string()
                        .pattern("^[0-9a-zA-Z][0-9a-zA-Z-]*(-?[a-zA-Z]+|[a-zA-Z][0-9]+|-[0-9]{6,})$")
                        .title("ID")
                        .description(
                            "The component ID. Must be unique within all layouts/pages in a layout-set. \
                             Cannot end with <dash><number>.",
                        ),
                ),
                prop(
                    "hidden",
                    expr(ExprVal::Boolean)
                        .optional_with(false)
                        .title("Hidden")
                        .description("Boolean value or expression indicating if the component should be hidden. Defaults to false."),
                ),
                prop("grid", reference("IGrid").optional()),
                prop("pageBreak", reference("IPageBreak").optional()),
                // Added by the hierarchy generator after loading.
                prop("baseComponentId", string().optional()).only_in(Variant::Internal),
                prop("multiPageIndex", integer().optional()).only_in(Variant::Internal),
            ])
        })?
        .define("FormComponentProps", || {
            obj([
                prop(
                    "readOnly",
                    expr(ExprVal::Boolean)
                        .optional_with(false)
                        .title("Read only/disabled?")
                        .description("Boolean value or expression indicating if the component should be read only/disabled."),
                ),
                prop(
                    "required",
                    expr(ExprVal::Boolean)
                        .optional_with(false)
                        .title("Required?")
                        .description("Boolean value or expression indicating if the component should be required."),
                ),
                prop("showValidations", reference("AllowedValidationMasks").optional()),
            ])
        })?
        .define("SummarizableComponentProps", || {
            obj([prop(
                "renderAsSummary",
                expr(ExprVal::Boolean)
                    .optional_with(false)
                    .title("Render as summary")
                    .description("Boolean value or expression indicating if the component should be rendered as a summary."),
            )])
        })?
        .define("LabeledComponentProps", || {
            obj([prop("labelSettings", reference("ILabelSettings").optional())])
        })?
        .define("GridComponentRef", || {
            obj([prop(
                "component",
                string().optional().title("Component ID").description("ID of the component"),
            )])
        })?
        .define("GridCellLabelFrom", || {
            obj([prop(
                "labelFrom",
                string()
                    .title("Fetch label from other component")
                    .description("Set this to a component id to display the label from that component"),
            )])
            .extends(reference("ITableColumnProperties"))
        })?
        .define("GridCellText", || {
            obj([
                prop(
                    "text",
                    string()
                        .title("Text")
                        .description("Text to display (can also be a key in text resources)"),
                ),
                prop("help", string().optional().title("Help").description("Help text to display")),
            ])
            .extends(reference("ITableColumnProperties"))
        })?
        .define("GridCell", || {
            // Authors point at a component by id; after loading the cell holds the component itself.
            union([
                reference("GridComponentRef").only_in(Variant::External),
                import("GridComponent", "src/layout/Grid/types").only_in(Variant::Internal),
                null(),
                reference("GridCellText"),
                reference("GridCellLabelFrom"),
            ])
        })?
        .define("GridRow", || {
            obj([
                prop("header", boolean().optional_with(false).title("Is header row?")),
                prop("readOnly", boolean().optional_with(false).title("Is row read-only?")),
                prop("columnOptions", reference("ITableColumnProperties").optional()),
                prop(
                    "cells",
                    arr(reference("GridCell"))
                        .title("Cells in table row")
                        .description("The list of cells in this row"),
                ),
            ])
        })?
        .define("GridRows", || {
            arr(reference("GridRow"))
                .title("Rows in Grid or Grid-like component")
                .description("The list of rows in this grid")
                .example(json!([{
                    "header": false,
                    "readOnly": false,
                    "cells": [{ "text": "hello.world" }, { "component": "myOtherComponent" }]
                }]))
        })?
        .define("SaveWhileTyping", || {
            number()
                .optional_with(DEFAULT_DEBOUNCE_TIMEOUT)
                .title("Automatic saving while typing")
                .description(format!(
                    "Lets you control how long we wait before saving the value locally while typing. \
                     The default value is {} milliseconds.",
                    DEFAULT_DEBOUNCE_TIMEOUT
                ))
                .comment(
                    "Beware, this used to be a number OR boolean value in v3.\n\
                     It can be smart to check the type of this value before using it.",
                )
        })?
        .define("HeadingLevel", || enumeration(2..=6))?
        .define("AllowedValidationMasks", || {
            arr(enumeration([
                "Schema",
                "Component",
                "Expression",
                "CustomBackend",
                "Required",
                "AllExceptRequired",
                "All",
            ]))
            .title("Validation types")
            .description("List of validation types to show")
        })?
        .define("PageValidation", || {
            obj([
                prop(
                    "page",
                    enumeration(["current", "currentAndPrevious", "all"])
                        .title("Page")
                        .description("Which pages should be validated when the next button is clicked."),
                ),
                prop("show", reference("AllowedValidationMasks")),
            ])
        })?
        .define("IComponentsSettings", || {
            obj([prop(
                "excludeFromPdf",
                arr(string())
                    .title("Exclude from PDF")
                    .description("List of components to exclude from the PDF generation"),
            )])
        })?
        .define("GlobalPageSettings", || {
            let flag = |title: &str, description: &str| {
                boolean().optional_with(false).title(title).description(description)
            };
            obj([
                prop(
                    "hideCloseButton",
                    flag("Hide close button", "Hide the close button in the upper right corner of the app"),
                ),
                prop(
                    "showLanguageSelector",
                    flag("Show language selector", "Show the language selector in the upper right corner of the app"),
                ),
                prop(
                    "showProgress",
                    flag("Show progress indicator", "Enables a progress indicator in the upper right corner of the app"),
                ),
                prop(
                    "autoSaveBehavior",
                    enumeration(["onChangeFormData", "onChangePage"])
                        .optional_with("onChangeFormData")
                        .title("Auto save behavior")
                        .description("An attribute specifying when the application will save form data."),
                ),
            ])
        })?
        .define("IPagesBaseSettings", || {
            obj([
                prop(
                    "order",
                    arr(string())
                        .title("Page order")
                        .description("List of pages in the order they should appear in the application"),
                ),
                prop(
                    "excludeFromPdf",
                    arr(string())
                        .optional()
                        .title("Exclude from PDF")
                        .description("List of pages to exclude from the PDF generation"),
                ),
                prop(
                    "pdfLayoutName",
                    string()
                        .optional()
                        .title("PDF layout name")
                        .description("Name of a custom layout file to use for PDF creation instead of the automatically generated PDF."),
                ),
            ])
        })?
        .define("IPagesSettings", || {
            obj([])
                .extends(reference("GlobalPageSettings"))
                .extends(reference("IPagesBaseSettings"))
        })?
        .define("ILayoutSettings", || {
            obj([
                prop("pages", reference("IPagesSettings")),
                prop("components", reference("IComponentsSettings").optional()),
                prop(
                    "receiptLayoutName",
                    string()
                        .optional()
                        .title("Receipt layout name")
                        .deprecated("This setting will be moved so that custom receipts can work when reloading the page."),
                ),
            ])
            .title("Layout settings")
            .description("Settings regarding layout pages and components")
        })?
        .define("ILayoutSets", || {
            obj([
                prop(
                    "sets",
                    arr(reference("ILayoutSet"))
                        .title("Layout sets")
                        .description("List of layout sets for different data types"),
                ),
                prop("uiSettings", reference("GlobalPageSettings").optional()),
            ])
            .title("Layout sets")
            .description("Settings regarding layout pages and components")
        })?
        .define("ILayoutSet", || {
            obj([
                prop(
                    "id",
                    string()
                        .title("ID")
                        .description("The layout-set ID. Must be unique within a given application."),
                ),
                prop(
                    "dataType",
                    string().title("Data type").description("The datatype to use this layout."),
                ),
                prop(
                    "tasks",
                    arr(string())
                        .optional()
                        .title("Tasks")
                        .description("An array specifying which task to use a layout-set"),
                ),
            ])
            .title("Layout set")
            .description("Settings regarding a specific layout-set")
        })?;
    Ok(())
}
