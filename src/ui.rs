use egui::color_picker::color_edit_button_rgb;
use egui::{Context, Slider, Ui};

use crate::light::AreaLight;
use crate::material::PbrMaterial;

/// Scales every text style of `ctx` by `font_scale`.
pub fn apply_style(ctx: &Context, font_scale: f32) {
    ctx.style_mut(|style| {
        for font in style.text_styles.values_mut() {
            font.size *= font_scale;
        }
    });
}

/// Draws the material and light controls. Returns true if any value changed.
pub fn area_light_panel(
    ctx: &Context,
    material: &mut PbrMaterial,
    light: Option<&mut AreaLight>,
) -> bool {
    let mut changed = false;
    egui::Window::new("Area Light")
        .resizable(false)
        .show(ctx, |ui| {
            changed |= color_row(ui, "Base Color", material.base_color.as_mut());
            changed |= slider(ui, "Metalness", &mut material.metalness, 0.0, 1.0);
            changed |= slider(ui, "Roughness", &mut material.roughness, 0.0, 1.0);
            changed |= slider(ui, "F0", &mut material.f0, 0.0, 1.0);

            let Some(light) = light else {
                return;
            };
            ui.separator();
            ui.add_space(ui.spacing().item_spacing.y * 2.0);

            changed |= color_row(ui, "Light Color", light.color.as_mut());
            changed |= slider(ui, "Light Intensity", &mut light.intensity, 0.0, 2.0);
            changed |= ui.checkbox(&mut light.double_sided, "Double Sided").changed();
        });
    changed
}

// The picker round-trips through HSVA, so it edits a copy and the stored
// colour is only replaced when the user changes it.
fn color_row(ui: &mut Ui, label: &str, rgb: &mut [f32; 3]) -> bool {
    ui.horizontal(|ui| {
        let mut edited = *rgb;
        let changed = color_edit_button_rgb(ui, &mut edited).changed();
        if changed {
            *rgb = edited;
        }
        ui.label(label);
        changed
    })
    .inner
}

// Values outside the range are only pulled back in once the slider is dragged.
fn slider(ui: &mut Ui, label: &str, value: &mut f32, min: f32, max: f32) -> bool {
    ui.add(
        Slider::new(value, min..=max)
            .clamp_to_range(false)
            .text(label),
    )
    .changed()
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn run_panel(material: &mut PbrMaterial, light: Option<&mut AreaLight>) -> bool {
        let ctx = Context::default();
        let mut changed = false;
        let mut light = light;
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            changed |= area_light_panel(ctx, material, light.as_deref_mut());
        });
        changed
    }

    #[test]
    fn panel_without_input_leaves_values_alone() {
        let mut material = PbrMaterial::new()
            .with_base_color(Vec3::new(1.0, 0.9, 0.8))
            .with_roughness(0.3)
            .with_f0(0.9);
        let mut light = AreaLight::builder().color(Vec3::new(0.0, 1.0, 1.0)).build();
        let before = (material, light.color, light.intensity, light.double_sided);

        assert!(!run_panel(&mut material, Some(&mut light)));
        assert_eq!(
            (material, light.color, light.intensity, light.double_sided),
            before
        );
    }

    #[test]
    fn displaying_colors_does_not_clamp_or_drift_them() {
        let mut material = PbrMaterial::new().with_base_color(Vec3::new(1.5, -0.2, 0.3));
        let mut light = AreaLight::builder().color(Vec3::new(0.0, 1.0, 1.0)).build();
        for _ in 0..3 {
            assert!(!run_panel(&mut material, Some(&mut light)));
        }
        assert_eq!(material.base_color, Vec3::new(1.5, -0.2, 0.3));
        assert_eq!(light.color, Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn panel_runs_without_a_light() {
        let mut material = PbrMaterial::default();
        assert!(!run_panel(&mut material, None));
        assert_eq!(material, PbrMaterial::default());
    }

    #[test]
    fn out_of_range_values_survive_display() {
        let mut material = PbrMaterial::new().with_metalness(3.0);
        let mut light = AreaLight::builder().intensity(5.0).build();
        run_panel(&mut material, Some(&mut light));
        assert_eq!(material.metalness, 3.0);
        assert_eq!(light.intensity, 5.0);
    }

    #[test]
    fn style_scales_text() {
        let ctx = Context::default();
        let body = ctx.style().text_styles[&egui::TextStyle::Body].size;
        apply_style(&ctx, 1.5);
        assert_eq!(ctx.style().text_styles[&egui::TextStyle::Body].size, body * 1.5);
    }
}
