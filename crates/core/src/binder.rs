//! Injects validated values into a per-request copy of a job template.

use crate::error::PipelineError;
use crate::mapping::ParameterMapping;
use crate::template::JobTemplate;
use crate::validation::ValidatedValue;

/// Produce a bound copy of `template`.
///
/// Each mapping with a validated value overwrites its node input. A mapping
/// without one keeps whatever the template already holds, and fails with
/// [`PipelineError::MissingRequiredParameter`] if it is required and the
/// template holds nothing. `template` itself is never modified.
pub fn bind(
    template: &JobTemplate,
    mappings: &[ParameterMapping],
    validated: &[ValidatedValue],
) -> Result<JobTemplate, PipelineError> {
    let mut bound = template.clone();

    for (index, mapping) in mappings.iter().enumerate() {
        if !bound.contains_node(&mapping.node_id) {
            return Err(PipelineError::UnknownNode {
                node_id: mapping.node_id.clone(),
            });
        }

        match validated.iter().find(|v| v.mapping_index == index) {
            Some(v) => {
                bound.set_input(&mapping.node_id, &mapping.input_field, v.value.clone());
            }
            None => {
                if mapping.required
                    && bound.input(&mapping.node_id, &mapping.input_field).is_none()
                {
                    return Err(PipelineError::MissingRequiredParameter {
                        node_id: mapping.node_id.clone(),
                        field: mapping.input_field.clone(),
                    });
                }
            }
        }
    }

    Ok(bound)
}
